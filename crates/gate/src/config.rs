use serde::{Deserialize, Serialize};

/// How [`IoGate::acquire`](crate::IoGate::acquire) accounts for an attempt that arrives after stop.
///
/// Both policies decide and mutate inside the same critical section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectPolicy {
	/// Reject without touching the pending count.
	#[default]
	FailFast,
	/// Count the attempt, release it on the caller's behalf, then reject.
	CountAndRelease,
}

impl RejectPolicy {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::FailFast => "fail-fast",
			Self::CountAndRelease => "count-and-release",
		}
	}
}

/// Construction options for an [`IoGate`](crate::IoGate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
	/// Label attached to log events.
	pub name: String,
	pub reject_policy: RejectPolicy,
}

impl Default for GateConfig {
	fn default() -> Self {
		Self {
			name: "iogate".to_string(),
			reject_policy: RejectPolicy::default(),
		}
	}
}

impl GateConfig {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	pub fn reject_policy(mut self, policy: RejectPolicy) -> Self {
		self.reject_policy = policy;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_kebab_case_policy_from_toml() {
		let cfg: GateConfig = toml::from_str(
			r#"
			name = "bcsp0"
			reject_policy = "count-and-release"
			"#,
		)
		.unwrap();
		assert_eq!(cfg.name, "bcsp0");
		assert_eq!(cfg.reject_policy, RejectPolicy::CountAndRelease);
	}

	#[test]
	fn missing_fields_fall_back_to_defaults() {
		let cfg: GateConfig = toml::from_str("").unwrap();
		assert_eq!(cfg, GateConfig::default());
		assert_eq!(cfg.reject_policy, RejectPolicy::FailFast);
	}

	#[test]
	fn unknown_fields_are_rejected() {
		assert!(toml::from_str::<GateConfig>("spin = true").is_err());
	}
}
