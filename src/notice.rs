//! Notices declared as types.
//!
//! An alternative to module-level [`EventName`] constants: a marker type
//! names its channel and payload, and the center is driven by the type.

use std::any::Any;

use crate::name::EventName;

/// A notification declared at the type level.
///
/// ```
/// use noticekit::{Center, Notice};
///
/// struct NavigationWillShow;
///
/// impl Notice for NavigationWillShow {
///     type Payload = String;
///     const NAME: &'static str = "navigation-will-show";
/// }
///
/// let center = Center::new();
/// let observer = center.observe_notice::<NavigationWillShow, _>(|title| {
///     assert_eq!(title, "Settings");
/// });
/// center.post_notice::<NavigationWillShow>("Settings".to_string());
/// drop(observer);
/// ```
pub trait Notice: 'static {
    /// Payload carried by this notice.
    type Payload: Any + Clone + Send + Sync;

    /// Channel identifier.
    const NAME: &'static str;

    /// The typed name for this notice. Box form unless overridden.
    #[must_use]
    fn event_name() -> EventName<Self::Payload> {
        EventName::new(Self::NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeMap;
    use crate::error::DecodeError;
    use crate::name::PayloadForm;

    struct Plain;

    impl Notice for Plain {
        type Payload = u32;
        const NAME: &'static str = "plain";
    }

    struct Decoded;

    impl Notice for Decoded {
        type Payload = u32;
        const NAME: &'static str = "decoded";

        fn event_name() -> EventName<u32> {
            EventName::with_decoder(Self::NAME, |m: &AttributeMap| {
                m.boxed::<u32>("n").copied().map_err(|_| DecodeError::custom("n"))
            })
        }
    }

    #[test]
    fn test_default_event_name_is_boxed() {
        let name = Plain::event_name();
        assert_eq!(name.as_str(), "plain");
        assert_eq!(name.form(), PayloadForm::Boxed);
    }

    #[test]
    fn test_overridden_event_name() {
        let name = Decoded::event_name();
        assert_eq!(name.as_str(), "decoded");
        assert_eq!(name.form(), PayloadForm::Custom);
    }
}
