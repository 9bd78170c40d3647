/// Per-frame resources for the frames that may be in flight at once.
///
/// `advance` moves to the next slot, wrapping at `len()`.
#[derive(Debug)]
pub struct FrameRing<T> {
  slots:   Vec<T>,
  current: usize,
}

impl<T> FrameRing<T> {
  /// Builds `frames_in_flight` slots, at least one.
  pub fn try_new<E>(
    frames_in_flight: usize,
    make: impl FnMut(usize) -> Result<T, E>,
  ) -> Result<Self, E> {
    Ok(Self {
      slots:   (0..frames_in_flight.max(1)).map(make).collect::<Result<_, _>>()?,
      current: 0,
    })
  }

  pub fn index(&self) -> usize {
    self.current
  }

  pub fn len(&self) -> usize {
    self.slots.len()
  }

  pub fn is_empty(&self) -> bool {
    self.slots.is_empty()
  }

  pub fn current(&self) -> &T {
    &self.slots[self.current]
  }

  pub fn previous(&self) -> &T {
    &self.slots[(self.current + self.slots.len() - 1) % self.slots.len()]
  }

  pub fn advance(&mut self) {
    self.current = (self.current + 1) % self.slots.len();
  }
}
