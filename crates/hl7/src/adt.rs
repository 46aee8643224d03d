//! Typed views over the ADT triggers this system handles.
//!
//! The views only pull raw field values out of a decoded [`SegmentMessage`]. They do
//! not interpret names or dates, and they never substitute defaults; that belongs to
//! the caller's translation layer.

use crate::message::{Header, Segment, SegmentMessage, TriggerEvent};
use crate::{Hl7Error, Hl7Result};
use chrono::NaiveDate;
use std::borrow::Cow;

const PID: &str = "PID";

/// PID-2, patient external id.
const PID_EXTERNAL_ID: usize = 2;
/// PID-3, patient internal id.
const PID_INTERNAL_ID: usize = 3;
/// PID-5, `family^given`.
const PID_NAME: usize = 5;
/// PID-7, `YYYYMMDD[HHMM[SS]]`.
const PID_BIRTH_DATE: usize = 7;

const BIRTH_DATE_FORMAT: &str = "%Y%m%d";

/// Fields carried by an admit-patient (`A01`) message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdmitPatient {
    pub family: Option<String>,
    pub given: Option<String>,
    /// Raw PID-7 value.
    pub birth_date: Option<String>,
}

impl AdmitPatient {
    /// Extract the admit fields from a decoded message.
    ///
    /// # Errors
    ///
    /// Returns [`Hl7Error`] if the trigger is not `A01` or the `PID` segment is missing.
    pub fn from_message(message: &SegmentMessage) -> Hl7Result<Self> {
        expect_trigger(message, TriggerEvent::Admit)?;
        let pid = message.segment(PID).ok_or(Hl7Error::MissingSegment(PID))?;
        let delimiters = message.delimiters();

        Ok(Self {
            family: pid.component(PID_NAME, 1, delimiters).map(Cow::into_owned),
            given: pid.component(PID_NAME, 2, delimiters).map(Cow::into_owned),
            birth_date: pid.text(PID_BIRTH_DATE, delimiters).map(Cow::into_owned),
        })
    }

    /// Build an admit message for a patient.
    pub fn to_message(
        family: &str,
        given: &str,
        birth_date: NaiveDate,
        header: &Header,
    ) -> SegmentMessage {
        let mut message = SegmentMessage::new(TriggerEvent::Admit, header);
        let delimiters = *message.delimiters();

        let mut pid = Segment::new(PID).with_field(1, "1");
        pid.set_components(PID_NAME, &[family, given], &delimiters);
        pid.set_field(
            PID_BIRTH_DATE,
            birth_date.format(BIRTH_DATE_FORMAT).to_string(),
        );

        message.push(pid);
        message
    }
}

/// Fields carried by a discharge-patient (`A23`) message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DischargePatient {
    /// PID-2.1, falling back to PID-3.1.
    pub external_id: Option<String>,
}

impl DischargePatient {
    /// Extract the discharge fields from a decoded message.
    ///
    /// # Errors
    ///
    /// Returns [`Hl7Error`] if the trigger is not a discharge or the `PID` segment is missing.
    pub fn from_message(message: &SegmentMessage) -> Hl7Result<Self> {
        expect_trigger(message, TriggerEvent::Discharge)?;
        let pid = message.segment(PID).ok_or(Hl7Error::MissingSegment(PID))?;
        let delimiters = message.delimiters();

        let external_id = pid
            .component(PID_EXTERNAL_ID, 1, delimiters)
            .or_else(|| pid.component(PID_INTERNAL_ID, 1, delimiters))
            .map(|id| id.trim().to_string());

        Ok(Self { external_id })
    }

    /// Build a discharge message for an external patient id.
    pub fn to_message(external_id: &str, header: &Header) -> SegmentMessage {
        let mut message = SegmentMessage::new(TriggerEvent::Discharge, header);
        let delimiters = *message.delimiters();

        let mut pid = Segment::new(PID).with_field(1, "1");
        pid.set_text(PID_EXTERNAL_ID, external_id, &delimiters);
        message.push(pid);
        message
    }
}

fn expect_trigger(message: &SegmentMessage, expected: TriggerEvent) -> Hl7Result<()> {
    if message.trigger() == &expected {
        return Ok(());
    }
    Err(Hl7Error::UnexpectedTrigger {
        expected: match expected {
            TriggerEvent::Admit => "A01",
            _ => "A23",
        },
        actual: message.trigger().code().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Header {
        let timestamp = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .expect("valid timestamp");
        Header::new("ReceptionApp", "Reception", timestamp)
    }

    #[test]
    fn extracts_admit_fields() {
        let raw = "MSH|^~\\&|App|Fac|||20240501||ADT^A01|1|P|2.3\rPID|1||||Ivanova^Anna||19900501";
        let msg = SegmentMessage::parse(raw).expect("parse");
        let admit = AdmitPatient::from_message(&msg).expect("admit view");
        assert_eq!(admit.family.as_deref(), Some("Ivanova"));
        assert_eq!(admit.given.as_deref(), Some("Anna"));
        assert_eq!(admit.birth_date.as_deref(), Some("19900501"));
    }

    #[test]
    fn admit_fields_may_be_absent() {
        let raw = "MSH|^~\\&|App|Fac|||20240501||ADT^A01|1|P|2.3\rPID|1";
        let msg = SegmentMessage::parse(raw).expect("parse");
        let admit = AdmitPatient::from_message(&msg).expect("admit view");
        assert_eq!(admit, AdmitPatient::default());
    }

    #[test]
    fn admit_requires_pid() {
        let raw = "MSH|^~\\&|App|Fac|||20240501||ADT^A01|1|P|2.3\rEVN|A01";
        let msg = SegmentMessage::parse(raw).expect("parse");
        assert_eq!(
            AdmitPatient::from_message(&msg),
            Err(Hl7Error::MissingSegment("PID"))
        );
    }

    #[test]
    fn admit_view_rejects_other_triggers() {
        let raw = "MSH|^~\\&|App|Fac|||20240501||ADT^A23|1|P|2.3\rPID|1|5";
        let msg = SegmentMessage::parse(raw).expect("parse");
        assert!(matches!(
            AdmitPatient::from_message(&msg),
            Err(Hl7Error::UnexpectedTrigger { expected: "A01", .. })
        ));
    }

    #[test]
    fn extracts_discharge_id_with_fallback() {
        let raw = "MSH|^~\\&|App|Fac|||20240501||ADT^A23|1|P|2.3\rPID|1|17^^^HOSP";
        let msg = SegmentMessage::parse(raw).expect("parse");
        let discharge = DischargePatient::from_message(&msg).expect("discharge view");
        assert_eq!(discharge.external_id.as_deref(), Some("17"));

        let raw = "MSH|^~\\&|App|Fac|||20240501||ADT^A03|1|P|2.3\rPID|1||23";
        let msg = SegmentMessage::parse(raw).expect("parse");
        let discharge = DischargePatient::from_message(&msg).expect("discharge view");
        assert_eq!(discharge.external_id.as_deref(), Some("23"));
    }

    #[test]
    fn built_admit_reads_back() {
        let birth = NaiveDate::from_ymd_opt(1990, 5, 1).expect("valid date");
        let msg = AdmitPatient::to_message("Ivanova", "Anna", birth, &header());
        let reparsed = SegmentMessage::parse(&msg.render()).expect("reparse");

        let admit = AdmitPatient::from_message(&reparsed).expect("admit view");
        assert_eq!(admit.family.as_deref(), Some("Ivanova"));
        assert_eq!(admit.given.as_deref(), Some("Anna"));
        assert_eq!(admit.birth_date.as_deref(), Some("19900501"));
    }

    #[test]
    fn names_with_delimiters_survive_a_round_trip() {
        let birth = NaiveDate::from_ymd_opt(1990, 5, 1).expect("valid date");
        let names = [
            "Anna|Maria",
            "Anna^Maria",
            "Anna~Maria",
            "Anna&Maria",
            "Anna\\Maria",
            "Anna\nMaria",
            "Anna\r\nMaria",
        ];
        for given in names {
            let msg = AdmitPatient::to_message("O'Brien|Smith", given, birth, &header());
            let reparsed = SegmentMessage::parse(&msg.render()).expect("reparse");
            assert_eq!(reparsed.segments().len(), 3, "{given:?}");

            let admit = AdmitPatient::from_message(&reparsed).expect("admit view");
            assert_eq!(admit.family.as_deref(), Some("O'Brien|Smith"));
            assert_eq!(admit.given.as_deref(), Some(given));
            assert_eq!(admit.birth_date.as_deref(), Some("19900501"));
        }
    }

    #[test]
    fn discharge_id_is_escaped() {
        let msg = DischargePatient::to_message("5|6", &header());
        assert!(msg.render().ends_with("\rPID|1|5\\F\\6"));

        let reparsed = SegmentMessage::parse(&msg.render()).expect("reparse");
        let discharge = DischargePatient::from_message(&reparsed).expect("discharge view");
        assert_eq!(discharge.external_id.as_deref(), Some("5|6"));
    }

    #[test]
    fn built_discharge_reads_back() {
        let msg = DischargePatient::to_message("5", &header());
        assert!(msg.render().ends_with("\rPID|1|5"));

        let reparsed = SegmentMessage::parse(&msg.render()).expect("reparse");
        let discharge = DischargePatient::from_message(&reparsed).expect("discharge view");
        assert_eq!(discharge.external_id.as_deref(), Some("5"));
    }
}
