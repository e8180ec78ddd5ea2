//! HTTP interface: warp filters over the care services plus the JSON
//! request and response shapes they exchange.

pub mod dto;
pub mod rest;

pub use rest::RestApi;
