//! # Event Payloads
//!
//! One data shape per topic, gathered into the [`EventData`] union. The
//! variant name, the payload struct and the [`Topic`] variant share one
//! identifier, so the topic of a payload is never supplied separately and a
//! topic can never carry another topic's shape.
//!
//! Every `match` over [`Topic`] in this module is exhaustive: registering a
//! topic without a payload shape does not compile.

pub mod analytics;
pub mod appointment;
pub mod auth;
pub mod content;
pub mod customer;
pub mod notification;
pub mod order;
pub mod product;

pub use analytics::*;
pub use appointment::*;
pub use auth::*;
pub use content::*;
pub use customer::*;
pub use notification::*;
pub use order::*;
pub use product::*;

use crate::topics::Topic;
use serde_json::Value;

macro_rules! event_data {
    ($($variant:ident),* $(,)?) => {
        /// Topic-specific data carried by an envelope.
        #[derive(Debug, Clone, PartialEq)]
        pub enum EventData {
            $(
                #[allow(missing_docs)]
                $variant($variant),
            )*
        }

        impl EventData {
            /// Topic this payload is published under.
            #[must_use]
            pub const fn topic(&self) -> Topic {
                match self {
                    $(EventData::$variant(_) => Topic::$variant,)*
                }
            }

            /// Serialize the inner shape to its JSON wire form.
            pub fn to_value(&self) -> Result<Value, serde_json::Error> {
                match self {
                    $(EventData::$variant(inner) => serde_json::to_value(inner),)*
                }
            }

            /// Interpret wire data as the shape registered for `topic`.
            pub fn from_value(topic: Topic, data: Value) -> Result<Self, serde_json::Error> {
                match topic {
                    $(Topic::$variant => serde_json::from_value(data).map(EventData::$variant),)*
                }
            }
        }

        $(
            impl From<$variant> for EventData {
                fn from(data: $variant) -> Self {
                    EventData::$variant(data)
                }
            }
        )*
    };
}

event_data! {
    // auth
    UserRegistered,
    UserLoggedIn,
    UserLoggedOut,
    PasswordResetRequested,
    PasswordChanged,
    // product
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    ProductStockLow,
    ProductPriceChanged,
    // order
    OrderCreated,
    OrderUpdated,
    OrderCancelled,
    OrderCompleted,
    OrderPaymentSucceeded,
    OrderPaymentFailed,
    OrderRefunded,
    // appointment
    BookingCreated,
    BookingConfirmed,
    BookingCancelled,
    BookingRescheduled,
    AppointmentReminderDue,
    // content
    PostPublished,
    PostUpdated,
    PostDeleted,
    MediaUploaded,
    // customer
    CustomerCreated,
    CustomerUpdated,
    CustomerDeleted,
    CustomerAddressAdded,
    // notification
    EmailRequested,
    SmsRequested,
    PushRequested,
    NotificationDelivered,
    NotificationFailed,
    // analytics
    PageViewed,
    EventTracked,
    ConversionRecorded,
}
