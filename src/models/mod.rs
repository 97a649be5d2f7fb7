pub mod agent;
pub mod engagement;
pub mod notification;
pub mod post;
pub mod response;
pub mod webhook;
