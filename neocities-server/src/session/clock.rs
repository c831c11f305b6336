/// Count-up session timer. Only ever moves forward.
#[derive(Debug, Default)]
pub struct SessionClock {
    elapsed: u64,
}

impl SessionClock {
    pub fn advance(&mut self) -> u64 {
        self.elapsed = self.elapsed.saturating_add(1);
        self.elapsed
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }
}
