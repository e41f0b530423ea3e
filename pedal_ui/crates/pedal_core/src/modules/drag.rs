use std::time::{Duration, Instant};

pub const DRAG_SLOP: f64 = 8.0;
pub const LONG_PRESS: Duration = Duration::from_millis(500);

/// Where an item dragged `offset` units along the list axis would land.
///
/// `extents` holds the size of every item. A neighbour is passed once the
/// dragged item's leading edge crosses the neighbour's midpoint; items are
/// displaced as little as possible.
pub fn target_index(from: usize, offset: f64, extents: &[f64]) -> usize {
    if from >= extents.len() {
        return from;
    }
    let mut target = from;
    if offset > 0.0 {
        let mut travelled = 0.0;
        for (i, extent) in extents.iter().enumerate().skip(from + 1) {
            if offset <= travelled + extent / 2.0 {
                break;
            }
            travelled += extent;
            target = i;
        }
    } else if offset < 0.0 {
        let distance = -offset;
        let mut travelled = 0.0;
        for i in (0..from).rev() {
            let extent = extents[i];
            if distance <= travelled + extent / 2.0 {
                break;
            }
            travelled += extent;
            target = i;
        }
    }
    target
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragOutcome {
    /// Released without moving far enough to drag.
    Click(usize),
    Moved { from: usize, to: usize },
    /// Dropped on the original position or outside the list.
    Cancelled,
    /// The long press already fired; releasing does nothing more.
    LongPress(usize),
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Gesture {
    Idle,
    Pressed {
        index: usize,
        origin: f64,
        at: Instant,
    },
    Dragging {
        from: usize,
        origin: f64,
        offset: f64,
    },
    LongPressed {
        index: usize,
    },
}

/// Pointer state machine for reordering a list by dragging.
///
/// Positions are along the list axis. The caller supplies the clock so the
/// controller stays deterministic.
pub struct DragController {
    extents: Vec<f64>,
    gesture: Gesture,
    on_move: Box<dyn FnMut(usize, usize)>,
    on_long_press: Box<dyn FnMut(usize)>,
}

impl DragController {
    pub fn new(
        extents: Vec<f64>,
        on_move: impl FnMut(usize, usize) + 'static,
        on_long_press: impl FnMut(usize) + 'static,
    ) -> Self {
        Self {
            extents,
            gesture: Gesture::Idle,
            on_move: Box::new(on_move),
            on_long_press: Box::new(on_long_press),
        }
    }

    pub fn set_extents(&mut self, extents: Vec<f64>) {
        self.extents = extents;
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.gesture, Gesture::Dragging { .. })
    }

    /// Index the dragged item would drop at, for drawing the gap.
    pub fn drop_index(&self) -> Option<usize> {
        match self.gesture {
            Gesture::Dragging { from, offset, .. } => {
                Some(target_index(from, offset, &self.extents))
            }
            _ => None,
        }
    }

    pub fn pointer_down(&mut self, index: usize, position: f64, now: Instant) {
        if index >= self.extents.len() {
            return;
        }
        self.gesture = Gesture::Pressed {
            index,
            origin: position,
            at: now,
        };
    }

    pub fn pointer_move(&mut self, position: f64, now: Instant) {
        self.poll(now);
        self.gesture = match self.gesture {
            Gesture::Pressed { index, origin, .. } if (position - origin).abs() > DRAG_SLOP => {
                Gesture::Dragging {
                    from: index,
                    origin,
                    offset: position - origin,
                }
            }
            Gesture::Dragging { from, origin, .. } => Gesture::Dragging {
                from,
                origin,
                offset: position - origin,
            },
            other => other,
        };
    }

    /// Fires the long press once the pointer has been held still long enough.
    pub fn poll(&mut self, now: Instant) {
        if let Gesture::Pressed { index, at, .. } = self.gesture {
            if now.duration_since(at) >= LONG_PRESS {
                self.gesture = Gesture::LongPressed { index };
                (self.on_long_press)(index);
            }
        }
    }

    /// `inside` is false when the pointer is released off the list.
    pub fn pointer_up(&mut self, inside: bool, now: Instant) -> DragOutcome {
        self.poll(now);
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        match gesture {
            Gesture::Idle => DragOutcome::Ignored,
            Gesture::Pressed { index, .. } => DragOutcome::Click(index),
            Gesture::LongPressed { index } => DragOutcome::LongPress(index),
            Gesture::Dragging { from, offset, .. } => {
                let to = target_index(from, offset, &self.extents);
                if !inside || to == from {
                    return DragOutcome::Cancelled;
                }
                (self.on_move)(from, to);
                DragOutcome::Moved { from, to }
            }
        }
    }

    pub fn cancel(&mut self) {
        self.gesture = Gesture::Idle;
    }
}
