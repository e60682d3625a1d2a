//! Tool-argument delta resolution.
//!
//! Upstream may stream a tool's argument JSON either as independent fragments
//! (concatenate to rebuild) or as cumulative snapshots (each delta repeats
//! everything sent so far), and may switch between the two within one call.
//! [`ToolCallAccumulator::resolve`] turns either form into the suffix the
//! client has not seen yet.
use rustc_hash::FxHashMap;

/// Per-tool-call state, created by the tool block's `content_block_start`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallAccumulator {
    pub id: String,
    pub name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    #[must_use]
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            arguments: String::new(),
        }
    }

    /// Everything accumulated so far.
    #[must_use]
    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    /// Absorb one upstream fragment and return the part that is new to the client.
    ///
    /// A non-empty buffer that is a byte prefix of `fragment` marks a cumulative
    /// snapshot: the suffix past the buffer is new and the buffer becomes
    /// `fragment`. Anything else is an independent fragment, emitted whole and
    /// appended. A fragment that merely happens to start with the buffer is
    /// misread as a snapshot; that is accepted.
    pub fn resolve(&mut self, fragment: &str) -> String {
        if !self.arguments.is_empty() && fragment.starts_with(self.arguments.as_str()) {
            let suffix = fragment[self.arguments.len()..].to_owned();
            self.arguments.clear();
            self.arguments.push_str(fragment);
            return suffix;
        }
        self.arguments.push_str(fragment);
        fragment.to_owned()
    }
}

/// Tool accumulators addressed by content-block index.
///
/// Indices are sparse and unbounded, so slots are keyed rather than laid out
/// positionally. Scoped to one exchange and dropped with it.
#[derive(Debug, Clone, Default)]
pub struct ToolCallTable {
    slots: FxHashMap<usize, ToolCallAccumulator>,
}

impl ToolCallTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the accumulator for `index`, replacing any previous one.
    pub fn start(&mut self, index: usize, accumulator: ToolCallAccumulator) {
        self.slots.insert(index, accumulator);
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ToolCallAccumulator> {
        self.slots.get(&index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ToolCallAccumulator> {
        self.slots.get_mut(&index)
    }

    /// Number of live accumulators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
