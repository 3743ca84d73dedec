mod link;

pub use link::{ClickEvent, CreateLinkRequest, Link, NewClickEvent};
