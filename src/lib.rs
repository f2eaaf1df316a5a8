//! surveycheck - Check OpenStreetMap survey point coordinates against their
//! `latitude`/`longitude` tags and mail a discrepancy report

pub mod api;
pub mod config;
pub mod domain;
pub mod exit;
pub mod logging;
pub mod mail;
pub mod osm;
pub mod pipeline;
pub mod prerequisites;
pub mod report;
pub mod validate;
pub mod workdir;
