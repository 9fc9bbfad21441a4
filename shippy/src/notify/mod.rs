//! Deploy notifications

pub mod notifier;
pub mod slack;

pub use notifier::{Delivery, NotificationChannel, NotifyContext, NotifyLinks, Notifier, Stage};
pub use slack::{Attachment, Color, SlackMessage, SlackWebhook};
