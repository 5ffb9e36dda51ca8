//! Configuration module

mod site;

pub use site::Copyright;
pub use site::FriendLink;
pub use site::HighlightConfig;
pub use site::SearchMethod;
pub use site::SiteConfig;
pub use site::SiteSettings;
pub use site::PLACEHOLDER_URL;
