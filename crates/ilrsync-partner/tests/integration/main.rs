//! Integration tests for ilrsync-partner
//!
//! Uses wiremock to simulate the partner API and verifies the request
//! shape and the error mapping of the PartnerClient.

mod common;

mod test_push;
