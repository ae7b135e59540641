//! Resource endpoint groups.
//!
//! Thin wrappers that map each server resource onto [`ApiClient::execute`].
//! Bodies and responses are plain JSON; their shape belongs to the server.

use serde_json::{json, Value};

use crate::client::ApiClient;
use crate::refresh::REFRESH_PATH;
use crate::request::{ApiRequest, ApiResponse};
use crate::AuthResult;

/// Query parameters for list endpoints.
pub type QueryParams<'a> = &'a [(&'a str, &'a str)];

fn with_query(mut request: ApiRequest, params: QueryParams<'_>) -> ApiRequest {
    for (key, value) in params {
        request = request.query(*key, *value);
    }
    request
}

impl ApiClient {
    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi { client: self }
    }

    pub fn users(&self) -> UsersApi<'_> {
        UsersApi { client: self }
    }

    pub fn appointments(&self) -> AppointmentsApi<'_> {
        AppointmentsApi { client: self }
    }

    pub fn medications(&self) -> MedicationsApi<'_> {
        MedicationsApi { client: self }
    }

    pub fn notifications(&self) -> NotificationsApi<'_> {
        NotificationsApi { client: self }
    }

    pub fn doctors(&self) -> DoctorsApi<'_> {
        DoctorsApi { client: self }
    }
}

/// `auth/*`. Session-establishing calls never trigger a refresh.
pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl AuthApi<'_> {
    pub async fn register(&self, data: &Value) -> AuthResult<ApiResponse> {
        let request = ApiRequest::post("auth/register")
            .body(data.clone())
            .without_refresh();
        self.client.execute(request).await
    }

    pub async fn login(&self, data: &Value) -> AuthResult<ApiResponse> {
        let request = ApiRequest::post("auth/login")
            .body(data.clone())
            .without_refresh();
        self.client.execute(request).await
    }

    pub async fn logout(&self) -> AuthResult<ApiResponse> {
        self.client.execute(ApiRequest::post("auth/logout")).await
    }

    /// Raw refresh call. Does not touch the token store.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<ApiResponse> {
        let request = ApiRequest::post(REFRESH_PATH)
            .body(json!({ "refreshToken": refresh_token }))
            .without_refresh();
        self.client.execute(request).await
    }
}

/// `users/*` for the logged-in user.
pub struct UsersApi<'a> {
    client: &'a ApiClient,
}

impl UsersApi<'_> {
    pub async fn get_profile(&self) -> AuthResult<ApiResponse> {
        self.client.execute(ApiRequest::get("users/profile")).await
    }

    pub async fn update_profile(&self, data: &Value) -> AuthResult<ApiResponse> {
        self.client
            .execute(ApiRequest::put("users/profile").body(data.clone()))
            .await
    }

    pub async fn change_password(&self, data: &Value) -> AuthResult<ApiResponse> {
        self.client
            .execute(ApiRequest::put("users/password").body(data.clone()))
            .await
    }
}

pub struct AppointmentsApi<'a> {
    client: &'a ApiClient,
}

impl AppointmentsApi<'_> {
    pub async fn list(&self, params: QueryParams<'_>) -> AuthResult<ApiResponse> {
        self.client
            .execute(with_query(ApiRequest::get("appointments"), params))
            .await
    }

    pub async fn get(&self, id: &str) -> AuthResult<ApiResponse> {
        self.client
            .execute(ApiRequest::get(format!("appointments/{}", id)))
            .await
    }

    pub async fn create(&self, data: &Value) -> AuthResult<ApiResponse> {
        self.client
            .execute(ApiRequest::post("appointments").body(data.clone()))
            .await
    }

    pub async fn update(&self, id: &str, data: &Value) -> AuthResult<ApiResponse> {
        self.client
            .execute(ApiRequest::put(format!("appointments/{}", id)).body(data.clone()))
            .await
    }

    /// Cancel is a DELETE carrying the reason in the body.
    pub async fn cancel(&self, id: &str, reason: &str) -> AuthResult<ApiResponse> {
        let request =
            ApiRequest::delete(format!("appointments/{}", id)).body(json!({ "reason": reason }));
        self.client.execute(request).await
    }
}

pub struct MedicationsApi<'a> {
    client: &'a ApiClient,
}

impl MedicationsApi<'_> {
    pub async fn list(&self, params: QueryParams<'_>) -> AuthResult<ApiResponse> {
        self.client
            .execute(with_query(ApiRequest::get("medications"), params))
            .await
    }

    pub async fn get(&self, id: &str) -> AuthResult<ApiResponse> {
        self.client
            .execute(ApiRequest::get(format!("medications/{}", id)))
            .await
    }

    pub async fn create(&self, data: &Value) -> AuthResult<ApiResponse> {
        self.client
            .execute(ApiRequest::post("medications").body(data.clone()))
            .await
    }

    pub async fn update(&self, id: &str, data: &Value) -> AuthResult<ApiResponse> {
        self.client
            .execute(ApiRequest::put(format!("medications/{}", id)).body(data.clone()))
            .await
    }

    pub async fn delete(&self, id: &str) -> AuthResult<ApiResponse> {
        self.client
            .execute(ApiRequest::delete(format!("medications/{}", id)))
            .await
    }

    /// Record a dose.
    pub async fn log(&self, id: &str, data: &Value) -> AuthResult<ApiResponse> {
        self.client
            .execute(ApiRequest::post(format!("medications/{}/log", id)).body(data.clone()))
            .await
    }
}

pub struct NotificationsApi<'a> {
    client: &'a ApiClient,
}

impl NotificationsApi<'_> {
    pub async fn list(&self, params: QueryParams<'_>) -> AuthResult<ApiResponse> {
        self.client
            .execute(with_query(ApiRequest::get("notifications"), params))
            .await
    }

    pub async fn mark_as_read(&self, id: &str) -> AuthResult<ApiResponse> {
        self.client
            .execute(ApiRequest::put(format!("notifications/{}/read", id)))
            .await
    }

    pub async fn mark_all_as_read(&self) -> AuthResult<ApiResponse> {
        self.client
            .execute(ApiRequest::put("notifications/read-all"))
            .await
    }

    pub async fn delete(&self, id: &str) -> AuthResult<ApiResponse> {
        self.client
            .execute(ApiRequest::delete(format!("notifications/{}", id)))
            .await
    }
}

pub struct DoctorsApi<'a> {
    client: &'a ApiClient,
}

impl DoctorsApi<'_> {
    pub async fn list(&self, params: QueryParams<'_>) -> AuthResult<ApiResponse> {
        self.client
            .execute(with_query(ApiRequest::get("doctors"), params))
            .await
    }

    pub async fn get(&self, id: &str) -> AuthResult<ApiResponse> {
        self.client
            .execute(ApiRequest::get(format!("doctors/{}", id)))
            .await
    }
}
