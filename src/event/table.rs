use thiserror::Error;

use super::{Event, N_EVENTS};

/// Keys 1-9 plus the rotary encoder
pub const N_INPUTS: usize = 10;

/// Press/release, or increment/decrement for the encoder
pub const N_EDGES: usize = 2;

/// Errors when writing a sequence into the table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("sequence has {len} events, at most {N_EVENTS} fit")]
    SequenceTooLong { len: usize },
    #[error("empty event at position {0} would end the sequence early")]
    EmptyEvent(usize),
}

/// Input row of the table: keys 1-9 at indices 0-8, encoder at 9
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Input(u8);

impl Input {
    pub const ROTARY: Input = Input(9);

    /// Key by its 1-based number (key 1 is the encoder push switch)
    pub fn key(number: u8) -> Option<Self> {
        (1..=9).contains(&number).then(|| Input(number - 1))
    }

    pub fn from_index(index: usize) -> Option<Self> {
        (index < N_INPUTS).then(|| Input(index as u8))
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn is_rotary(&self) -> bool {
        *self == Self::ROTARY
    }

    /// 1-based key number, `None` for the encoder rotation
    pub fn key_number(&self) -> Option<u8> {
        (!self.is_rotary()).then_some(self.0 + 1)
    }
}

/// Edge column of the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// Key press, or clockwise encoder step
    Press = 0,
    /// Key release, or counter-clockwise encoder step
    Release = 1,
}

impl Edge {
    pub const INCREMENT: Edge = Edge::Press;
    pub const DECREMENT: Edge = Edge::Release;

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// An (input, edge) pair: the thing a sequence is assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Trigger {
    pub input: Input,
    pub edge: Edge,
}

impl Trigger {
    pub fn new(input: Input, edge: Edge) -> Self {
        Self { input, edge }
    }

    /// Every trigger in table order
    pub fn all() -> impl Iterator<Item = Trigger> {
        (0..N_INPUTS).flat_map(|i| {
            [Edge::Press, Edge::Release]
                .into_iter()
                .map(move |edge| Trigger::new(Input(i as u8), edge))
        })
    }
}

/// Current event assignments, indexed `[input][edge][sequence]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentTable {
    slots: [[[Event; N_EVENTS]; N_EDGES]; N_INPUTS],
}

impl Default for AssignmentTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AssignmentTable {
    pub const fn new() -> Self {
        Self {
            slots: [[[Event::EMPTY; N_EVENTS]; N_EDGES]; N_INPUTS],
        }
    }

    /// Raw slot, `None` when `index` is out of range
    pub fn get(&self, trigger: Trigger, index: usize) -> Option<Event> {
        self.slots[trigger.input.index()][trigger.edge.index()]
            .get(index)
            .copied()
    }

    /// All `N_EVENTS` slots of a trigger, including unused ones
    pub fn slots(&self, trigger: Trigger) -> &[Event; N_EVENTS] {
        &self.slots[trigger.input.index()][trigger.edge.index()]
    }

    /// Events of a trigger up to the first empty slot
    pub fn sequence(&self, trigger: Trigger) -> impl Iterator<Item = Event> + '_ {
        self.slots(trigger)
            .iter()
            .copied()
            .take_while(|event| !event.is_empty())
    }

    /// Replace the sequence of a trigger. The slot is left untouched on error.
    pub fn assign(&mut self, trigger: Trigger, events: &[Event]) -> Result<(), TableError> {
        if events.len() > N_EVENTS {
            return Err(TableError::SequenceTooLong { len: events.len() });
        }
        if let Some(position) = events.iter().position(Event::is_empty) {
            return Err(TableError::EmptyEvent(position));
        }

        let slots = &mut self.slots[trigger.input.index()][trigger.edge.index()];
        *slots = [Event::EMPTY; N_EVENTS];
        slots[..events.len()].copy_from_slice(events);
        Ok(())
    }

    pub fn clear(&mut self, trigger: Trigger) {
        self.slots[trigger.input.index()][trigger.edge.index()] = [Event::EMPTY; N_EVENTS];
    }

    pub fn clear_all(&mut self) {
        *self = Self::new();
    }

    /// Number of triggers with at least one event
    pub fn assigned_count(&self) -> usize {
        Trigger::all()
            .filter(|t| !self.slots(*t)[0].is_empty())
            .count()
    }

    pub fn as_array(&self) -> &[[[Event; N_EVENTS]; N_EDGES]; N_INPUTS] {
        &self.slots
    }
}
