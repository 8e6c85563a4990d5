//! Normalization of raw provider output into one uniform fragment stream.
//!
//! Natively streaming adapters pass their deltas through one-to-one. Complete
//! responses are decomposed into per-character fragments so callers observe
//! the same incremental protocol regardless of provider.
//!
//! ```rust
//! use sprovider::StreamNormalizer;
//!
//! let fragments = StreamNormalizer::new().split("héllo");
//! let texts: Vec<_> = fragments.iter().map(|fragment| fragment.text.as_str()).collect();
//! assert_eq!(texts, vec!["h", "é", "l", "l", "o"]);
//! ```

use std::collections::VecDeque;
use std::pin::Pin;

use futures_core::Stream;
use futures_util::{StreamExt, stream};

use crate::{BoxedEventStream, ProviderError, RawResponse, Role, StreamEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFragment {
    pub text: String,
}

impl StreamFragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

pub type FragmentStream<'a> =
    Pin<Box<dyn Stream<Item = Result<StreamFragment, ProviderError>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamNormalizer {
    chars_per_fragment: usize,
}

impl Default for StreamNormalizer {
    fn default() -> Self {
        Self {
            chars_per_fragment: 1,
        }
    }
}

impl StreamNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chars_per_fragment(mut self, chars_per_fragment: usize) -> Self {
        self.chars_per_fragment = chars_per_fragment.max(1);
        self
    }

    pub fn chars_per_fragment(&self) -> usize {
        self.chars_per_fragment
    }

    pub fn normalize<'a>(&self, raw: RawResponse<'a>) -> FragmentStream<'a> {
        match raw {
            RawResponse::Stream(events) => Box::pin(native_fragments(events, *self)),
            RawResponse::Complete(response) => {
                let fragments = self.split(&response.content);
                Box::pin(stream::iter(fragments.into_iter().map(Ok)))
            }
        }
    }

    /// Splits `text` on Unicode scalar boundaries; concatenating the result
    /// reproduces `text` exactly.
    pub fn split(&self, text: &str) -> Vec<StreamFragment> {
        let mut fragments = Vec::new();
        let mut current = String::new();
        let mut count = 0;

        for ch in text.chars() {
            current.push(ch);
            count += 1;
            if count == self.chars_per_fragment {
                fragments.push(StreamFragment::new(std::mem::take(&mut current)));
                count = 0;
            }
        }

        if !current.is_empty() {
            fragments.push(StreamFragment::new(current));
        }

        fragments
    }
}

struct NativeState<'a> {
    events: BoxedEventStream<'a>,
    normalizer: StreamNormalizer,
    seen_text: bool,
    pending: VecDeque<StreamFragment>,
}

fn native_fragments<'a>(
    events: BoxedEventStream<'a>,
    normalizer: StreamNormalizer,
) -> impl Stream<Item = Result<StreamFragment, ProviderError>> + Send + 'a {
    let state = NativeState {
        events,
        normalizer,
        seen_text: false,
        pending: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }

            let event = match state.events.next().await {
                Some(event) => event,
                None => return None,
            };

            match event {
                Ok(StreamEvent::TextDelta(delta)) => {
                    if delta.is_empty() {
                        continue;
                    }

                    state.seen_text = true;
                    return Some((Ok(StreamFragment::new(delta)), state));
                }
                Ok(StreamEvent::MessageComplete(message)) => {
                    if message.role == Role::Assistant {
                        state.fall_back_to(&message.content);
                    }
                }
                Ok(StreamEvent::ResponseComplete(response)) => {
                    state.fall_back_to(&response.content);
                }
                Err(error) => return Some((Err(error), state)),
            }
        }
    })
}

impl NativeState<'_> {
    // A stream that carried its text only in the terminal milestone is
    // decomposed the same way as a complete response.
    fn fall_back_to(&mut self, content: &str) {
        if self.seen_text || content.is_empty() {
            return;
        }

        self.seen_text = true;
        self.pending.extend(self.normalizer.split(content));
    }
}
