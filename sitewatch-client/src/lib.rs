//! SiteWatch client library: configuration and the console
//! application wrapper around [`sitewatch_core::StreamService`].

pub mod app;
pub mod config;
