use std::fmt;

use crate::types::StackFrame;

/// Shown instead of a file name for frames without source information.
pub const NO_FILE: &str = "No file found.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrameData {
    /// 0 is the innermost frame.
    pub level: usize,
    pub function: String,
    pub file: Option<String>,
    pub line: i64,
    pub address: Option<String>,
    pub frame_id: i64,
}

impl StackFrameData {
    pub fn from_frame(level: usize, frame: &StackFrame) -> Self {
        Self {
            level,
            function: frame.name.clone(),
            file: frame
                .source
                .as_ref()
                .and_then(|source| source.usable_path())
                .map(str::to_string),
            line: frame.line,
            address: frame.instruction_pointer_reference.clone(),
            frame_id: frame.id,
        }
    }

    /// Stands in for a frame when there is no snapshot.
    pub fn sentinel() -> Self {
        Self {
            level: 0,
            function: String::new(),
            file: None,
            line: -1,
            address: None,
            frame_id: -1,
        }
    }

    /// Backends may report line -1 themselves, so the frame id has to match too.
    pub fn is_sentinel(&self) -> bool {
        self.line == -1 && self.frame_id == -1
    }

    pub fn display_file(&self) -> &str {
        self.file.as_deref().unwrap_or(NO_FILE)
    }

    /// Whether the frame points at a place an editor can show.
    pub fn has_location(&self) -> bool {
        self.file.is_some() && self.line > 0
    }
}

impl fmt::Display for StackFrameData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} at {}:{}",
            self.level,
            self.function,
            self.display_file(),
            self.line
        )?;
        if let Some(address) = &self.address {
            write!(f, " ({address})")?;
        }
        Ok(())
    }
}

/// The stack of the active thread at the last stop.
#[derive(Debug, Default, Clone)]
pub struct CallStackCache {
    thread_id: Option<i64>,
    frames: Vec<StackFrameData>,
    cursor: Option<usize>,
}

impl CallStackCache {
    /// Replaces the snapshot. Levels are renumbered from 0 in the given order.
    pub fn set_frames(&mut self, thread_id: i64, frames: &[StackFrame]) {
        self.thread_id = Some(thread_id);
        self.frames = frames
            .iter()
            .enumerate()
            .map(|(level, frame)| StackFrameData::from_frame(level, frame))
            .collect();
        self.cursor = None;
    }

    pub fn thread_id(&self) -> Option<i64> {
        self.thread_id
    }

    pub fn frames(&self) -> &[StackFrameData] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The selected frame, else the innermost one with a location, else the
    /// innermost one. Only an empty snapshot yields the sentinel.
    pub fn current_frame(&self) -> StackFrameData {
        self.cursor
            .and_then(|level| self.frames.get(level))
            .or_else(|| self.frames.iter().find(|frame| frame.has_location()))
            .or_else(|| self.frames.first())
            .cloned()
            .unwrap_or_else(StackFrameData::sentinel)
    }

    /// Moves the cursor to `level`. Returns the frame, or `None` if there is no
    /// such level.
    pub fn select(&mut self, level: usize) -> Option<&StackFrameData> {
        let frame = self.frames.get(level)?;
        self.cursor = Some(level);
        Some(frame)
    }

    pub fn contains(&self, frame_id: i64) -> bool {
        self.frames.iter().any(|frame| frame.frame_id == frame_id)
    }

    pub fn clear(&mut self) {
        self.thread_id = None;
        self.frames.clear();
        self.cursor = None;
    }
}
