// self
use crate::obs::{CheckKind, CheckOutcome};

/// Records a check outcome via the global metrics recorder (when enabled).
pub fn record_check_outcome(kind: CheckKind, outcome: CheckOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"guardpost_check_total",
			"check" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_check_outcome_noop_without_metrics() {
		record_check_outcome(CheckKind::Csrf, CheckOutcome::Rejected);
	}
}
