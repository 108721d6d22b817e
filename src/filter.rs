use crate::events::{EventSink, PipelineEvent};
use crate::types::{DateRange, ServiceRecord};

/// Keep the records dated inside `range`, in source order.
pub fn filter_by_date(
    records: &[ServiceRecord],
    range: &DateRange,
    sink: &dyn EventSink,
) -> Vec<ServiceRecord> {
    let kept: Vec<ServiceRecord> = records
        .iter()
        .filter(|r| range.contains(r.occurred_on))
        .cloned()
        .collect();
    sink.emit(PipelineEvent::DateFiltered {
        kept: kept.len(),
        dropped: records.len() - kept.len(),
    });
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn record(activity: &str, when: Option<NaiveDateTime>) -> ServiceRecord {
        ServiceRecord {
            technician: Some("ana".to_string()),
            helper: None,
            activity: activity.to_string(),
            occurred_on: when,
            contract_id: None,
        }
    }

    #[test]
    fn keeps_boundaries_and_drops_outside() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let range = DateRange::new(start, end).unwrap();
        let start_of_day = start.and_hms_opt(0, 0, 0).unwrap();
        let end_of_day = end.and_hms_micro_opt(23, 59, 59, 999_999).unwrap();

        let records = vec![
            record("at-start", Some(start_of_day)),
            record("before-start", Some(start_of_day - Duration::microseconds(1))),
            record("at-end", Some(end.and_hms_opt(0, 0, 0).unwrap())),
            record("end-of-day", Some(end_of_day)),
            record("after-end", Some(end_of_day + Duration::microseconds(1))),
            record("unknown", None),
        ];
        let sink = MemorySink::default();

        let kept = filter_by_date(&records, &range, &sink);
        let names: Vec<&str> = kept.iter().map(|r| r.activity.as_str()).collect();

        assert_eq!(names, vec!["at-start", "at-end", "end-of-day"]);
        assert_eq!(
            sink.events(),
            vec![PipelineEvent::DateFiltered { kept: 3, dropped: 3 }]
        );
    }
}
