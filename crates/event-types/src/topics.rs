//! # Topic Registry
//!
//! The closed set of topics that may travel over the bus, grouped by the
//! domain that owns them. Topics are namespaced `domain.entity.action`
//! (or `domain.action` when the domain is the entity).
//!
//! The registry is static: adding a topic is a code change here plus a
//! payload shape in [`crate::payloads`]. There is no runtime registration.
//!
//! ```text
//! auth.*  product.*  order.*  appointment.*  content.*  customer.*  notification.*  analytics.*
//! ```

use crate::errors::UnknownTopic;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Domain that owns a group of topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TopicDomain {
    /// Registration, sessions and credentials.
    Auth,
    /// Catalog and inventory.
    Product,
    /// Orders and their payments.
    Order,
    /// Bookings and reminders.
    Appointment,
    /// Posts and media.
    Content,
    /// Customer profiles.
    Customer,
    /// Outbound email, SMS and push.
    Notification,
    /// Tracking and conversions.
    Analytics,
}

impl TopicDomain {
    /// Every domain, in registry order.
    pub const ALL: [TopicDomain; 8] = [
        TopicDomain::Auth,
        TopicDomain::Product,
        TopicDomain::Order,
        TopicDomain::Appointment,
        TopicDomain::Content,
        TopicDomain::Customer,
        TopicDomain::Notification,
        TopicDomain::Analytics,
    ];

    /// Namespace prefix shared by every topic of this domain.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            TopicDomain::Auth => "auth",
            TopicDomain::Product => "product",
            TopicDomain::Order => "order",
            TopicDomain::Appointment => "appointment",
            TopicDomain::Content => "content",
            TopicDomain::Customer => "customer",
            TopicDomain::Notification => "notification",
            TopicDomain::Analytics => "analytics",
        }
    }
}

impl fmt::Display for TopicDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

macro_rules! topic_registry {
    ($(
        $domain:ident {
            $($variant:ident => $name:literal),* $(,)?
        }
    )*) => {
        /// Every topic known to the bus.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Topic {
            $($(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )*)*
        }

        impl Topic {
            /// Every registered topic, grouped by domain.
            pub const ALL: &'static [Topic] = &[$($(Topic::$variant,)*)*];

            /// Wire name of the topic; also the broadcast channel name.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($(Topic::$variant => $name,)*)*
                }
            }

            /// Domain that owns this topic.
            #[must_use]
            pub const fn domain(self) -> TopicDomain {
                match self {
                    $($(Topic::$variant => TopicDomain::$domain,)*)*
                }
            }
        }

        impl TopicDomain {
            /// Topics owned by this domain.
            #[must_use]
            pub const fn topics(self) -> &'static [Topic] {
                match self {
                    $(TopicDomain::$domain => &[$(Topic::$variant,)*],)*
                }
            }
        }

        impl FromStr for Topic {
            type Err = UnknownTopic;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($($name => Ok(Topic::$variant),)*)*
                    other => Err(UnknownTopic(other.to_string())),
                }
            }
        }
    };
}

topic_registry! {
    Auth {
        UserRegistered => "auth.user.registered",
        UserLoggedIn => "auth.user.logged_in",
        UserLoggedOut => "auth.user.logged_out",
        PasswordResetRequested => "auth.password.reset_requested",
        PasswordChanged => "auth.password.changed",
    }
    Product {
        ProductCreated => "product.created",
        ProductUpdated => "product.updated",
        ProductDeleted => "product.deleted",
        ProductStockLow => "product.inventory.low",
        ProductPriceChanged => "product.price.changed",
    }
    Order {
        OrderCreated => "order.created",
        OrderUpdated => "order.updated",
        OrderCancelled => "order.cancelled",
        OrderCompleted => "order.completed",
        OrderPaymentSucceeded => "order.payment.succeeded",
        OrderPaymentFailed => "order.payment.failed",
        OrderRefunded => "order.payment.refunded",
    }
    Appointment {
        BookingCreated => "appointment.booking.created",
        BookingConfirmed => "appointment.booking.confirmed",
        BookingCancelled => "appointment.booking.cancelled",
        BookingRescheduled => "appointment.booking.rescheduled",
        AppointmentReminderDue => "appointment.reminder.due",
    }
    Content {
        PostPublished => "content.post.published",
        PostUpdated => "content.post.updated",
        PostDeleted => "content.post.deleted",
        MediaUploaded => "content.media.uploaded",
    }
    Customer {
        CustomerCreated => "customer.created",
        CustomerUpdated => "customer.updated",
        CustomerDeleted => "customer.deleted",
        CustomerAddressAdded => "customer.address.added",
    }
    Notification {
        EmailRequested => "notification.email.requested",
        SmsRequested => "notification.sms.requested",
        PushRequested => "notification.push.requested",
        NotificationDelivered => "notification.delivered",
        NotificationFailed => "notification.failed",
    }
    Analytics {
        PageViewed => "analytics.page.viewed",
        EventTracked => "analytics.event.tracked",
        ConversionRecorded => "analytics.conversion.recorded",
    }
}

impl Topic {
    /// Membership check against the registry.
    #[must_use]
    pub fn is_known(name: &str) -> bool {
        name.parse::<Topic>().is_ok()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Serialize for Topic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(de::Error::custom)
    }
}
