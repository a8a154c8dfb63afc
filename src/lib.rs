//! Pawdash - a dashboard core that runs per-user web apps in containers
//!
//! This library provides the lifecycle machinery behind the dashboard:
//! - Keeps one code directory per app on disk as the source of truth
//! - Generates human-readable app names and derives container names,
//!   URLs, and reverse-proxy routing labels from them
//! - Creates, replaces, and removes the container backing each app,
//!   bind-mounting the app's code and attaching traefik labels
//! - Reconciles on-disk apps against live container state for listings
//! - Exposes the whole action set over a small JSON management API

pub mod api;
pub mod config;
pub mod docker;
pub mod error;
pub mod lifecycle;
pub mod naming;
pub mod reconcile;
pub mod store;
