//! Global position and the optional processing range.

/// What the position did at the end of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Boundary {
    /// Still inside the range (or no range set).
    Inside,
    /// Range end reached with looping enabled.
    Wrap,
    /// Range end reached without looping.
    End,
}

#[derive(Debug, Clone)]
pub(crate) struct Transport {
    position: u64,
    length: Option<u64>,
    looping: bool,
    buffersize: usize,
}

impl Transport {
    pub(crate) fn new(buffersize: usize, length: Option<u64>, looping: bool) -> Self {
        Self {
            position: 0,
            length,
            looping: looping && length.is_some(),
            buffersize,
        }
    }

    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn set_position(&mut self, frames: u64) {
        self.position = frames;
    }

    pub(crate) fn length(&self) -> Option<u64> {
        self.length
    }

    pub(crate) fn is_looping(&self) -> bool {
        self.looping
    }

    /// Frames to read this cycle: a full buffer, or what is left of the
    /// range.
    pub(crate) fn frames_for_cycle(&self) -> usize {
        match self.length {
            Some(length) => {
                let left = length.saturating_sub(self.position);
                left.min(self.buffersize as u64) as usize
            }
            None => self.buffersize,
        }
    }

    /// Advances by the frames just processed.
    pub(crate) fn advance(&mut self, frames: usize) -> Boundary {
        self.position += frames as u64;
        match self.length {
            Some(length) if self.position >= length => {
                if self.looping {
                    self.position = 0;
                    Boundary::Wrap
                } else {
                    Boundary::End
                }
            }
            _ => Boundary::Inside,
        }
    }
}
