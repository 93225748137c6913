//! Scheduled retention for Yandex Cloud compute images.
//!
//! For every folder of every configured cloud account, the newest
//! `keep_count` images are kept and the rest are deleted, with at most
//! `max_deletions_per_run` deletions per account per run.
//!
//! The binary wires these pieces together; the library exposes them so the
//! pipeline can be driven against any [`providers::SessionFactory`].

pub mod accounts;
pub mod config;
pub mod observability;
pub mod providers;
pub mod retention;
pub mod routing;

#[cfg(test)]
mod tests;
