use std::time::{Duration, Instant};

pub struct StepTimer {
	label: String,
	start: Instant,
	last: Instant,
	steps: Vec<(&'static str, Duration)>,
}

impl StepTimer {
	pub fn new(label: impl Into<String>) -> Self {
		let now = Instant::now();
		StepTimer {
			label: label.into(),
			start: now,
			last: now,
			steps: vec![],
		}
	}

	pub fn step(&mut self, name: &'static str) {
		let now = Instant::now();
		self.steps.push((name, now - self.last));
		self.last = now;
	}

	pub fn stats(&self) -> String {
		let mut stats: Vec<String> = self
			.steps
			.iter()
			.map(|(name, elapsed)| format!("{name}={elapsed:?}"))
			.collect();
		stats.push(format!("total={:?}", self.start.elapsed()));
		stats.join(" ")
	}
}

impl Drop for StepTimer {
	fn drop(&mut self) {
		log::debug!("{} {}", self.label, self.stats());
	}
}
