//! Authenticated request pipeline for the MediPulse API.
//!
//! This crate provides:
//! - A token store holding the session, written through to persistent storage
//! - A dispatcher that attaches the bearer token to every request
//! - Single-flight token refresh: concurrent 401s share one refresh and are
//!   retried once, in arrival order, with the new token
//! - Resource endpoint groups and the login/register/logout flows

mod client;
mod coordinator;
mod dispatcher;
mod endpoints;
mod error;
mod refresh;
mod refresh_fsm;
mod request;
mod token_store;
mod transport;

#[cfg(test)]
mod tests;

pub use client::{ApiClient, AuthSession, AuthSnapshot, UnauthenticatedHandler};
pub use coordinator::{RefreshCoordinator, RefreshLease, RefreshOutcome, Ticket};
pub use dispatcher::RequestDispatcher;
pub use endpoints::{
    AppointmentsApi, AuthApi, DoctorsApi, MedicationsApi, NotificationsApi, QueryParams, UsersApi,
};
pub use error::{AuthError, AuthResult, RefreshError};
pub use refresh::{TokenRefresher, REFRESH_PATH};
pub use refresh_fsm::refresh_machine;
pub use refresh_fsm::{RefreshMachine, RefreshMachineInput, RefreshMachineState, RefreshState};
pub use request::{ApiRequest, ApiResponse, TransportRequest};
pub use token_store::TokenStore;
pub use transport::{HttpTransport, Transport};

pub use reqwest::Method;
