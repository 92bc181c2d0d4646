//! Integration tests for shotwatch-drive
//!
//! Uses wiremock to simulate the Google Drive v3 API and verifies the
//! request shapes and error handling of the DriveRemoteStore.

mod common;

mod test_auth;
mod test_containers;
mod test_objects;
mod test_retry;
