//! # Form Server
//!
//! HTTP surface for the prediction form: a server-rendered page with a
//! dataset selector and a two-column form, plus a small JSON API over the
//! same pipeline.

mod pages;
mod server;

pub use pages::{DISCLAIMER, PageView, Pages};
pub use server::{WebState, router, run};
