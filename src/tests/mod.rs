//! Cross-module tests.
//!
//! These drive the whole pipeline, from environment discovery to HTTP calls,
//! against a mock Yandex Cloud API.
