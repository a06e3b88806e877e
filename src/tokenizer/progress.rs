// src/tokenizer/progress.rs

// With the "progressbar" feature the trainer drives a real indicatif bar; without
// it these no-op stand-ins keep the call sites identical.

#[cfg(feature = "progressbar")]
pub(crate) use indicatif::{ProgressBar, ProgressStyle};

#[cfg(not(feature = "progressbar"))]
pub(crate) use shim::{ProgressBar, ProgressStyle};

#[cfg(not(feature = "progressbar"))]
mod shim {
    use std::borrow::Cow;

    pub struct ProgressBar;

    impl ProgressBar {
        pub fn new(_length: u64) -> Self {
            Self {}
        }

        pub fn set_length(&self, _length: u64) {}
        pub fn set_message(&self, _message: impl Into<Cow<'static, str>>) {}
        pub fn finish(&self) {}
        pub fn reset(&self) {}
        pub fn inc(&self, _inc: u64) {}
        pub fn set_style(&self, _style: ProgressStyle) {}
        pub fn set_position(&self, _pos: u64) {}
    }

    pub struct ProgressStyle;

    impl ProgressStyle {
        pub fn default_bar() -> Self {
            Self {}
        }

        pub fn template(self, _template: &str) -> Result<Self, String> {
            Ok(self)
        }
    }
}
