use clap::{Parser, Subcommand};
use chrono::{NaiveDate, Utc};
use fhir::{Encounter, Resource};
use hl7::{AdmitPatient, DischargePatient, SegmentMessage, TriggerEvent};
use relay_core::{
    front_desk::encounter_from_request, translator, CoreResult, EncounterRequest, NewPatient,
};
use std::io::Read;

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Clinical relay message tool")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an admit-patient segment message
    Admit {
        /// First name
        first_name: String,
        /// Last name
        last_name: String,
        /// Date of birth (YYYY-MM-DD), defaults to today
        #[arg(long)]
        birth_date: Option<NaiveDate>,
    },
    /// Print a discharge-patient segment message
    Discharge {
        /// Registry patient id
        id: String,
    },
    /// Print an Encounter resource
    Encounter {
        /// Registry patient id, or `Patient/<id>`
        patient_id: String,
        /// Practitioner display name
        doctor_name: String,
        /// Reason for the visit
        #[arg(long)]
        reason: Option<String>,
        /// Period start (RFC 3339, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD`), defaults to now
        #[arg(long)]
        start: Option<String>,
        /// Status code (default: in-progress)
        #[arg(long)]
        status: Option<String>,
    },
    /// Decode a segment message or resource and print a summary
    Decode {
        /// File to read, or `-` for stdin
        path: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Admit {
            first_name,
            last_name,
            birth_date,
        }) => {
            println!("{}", admit_text(&first_name, &last_name, birth_date));
        }
        Some(Commands::Discharge { id }) => {
            println!("{}", discharge_text(&id));
        }
        Some(Commands::Encounter {
            patient_id,
            doctor_name,
            reason,
            start,
            status,
        }) => {
            let request = EncounterRequest {
                patient_id,
                doctor_name: Some(doctor_name),
                reason,
                visit_date: start,
            };
            match encounter_json(&request, status) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Error building encounter: {}", e),
            }
        }
        Some(Commands::Decode { path }) => {
            let input = read_input(&path)?;
            match summarize(&input) {
                Ok(lines) => {
                    for line in lines {
                        println!("{}", line);
                    }
                }
                Err(e) => eprintln!("Error decoding {}: {}", path, e),
            }
        }
        None => {
            println!("Use 'relay --help' for commands");
        }
    }

    Ok(())
}

fn read_input(path: &str) -> std::io::Result<String> {
    if path == "-" {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        Ok(input)
    } else {
        std::fs::read_to_string(path)
    }
}

/// Segments are printed one per line; the decoder accepts `\n` as well as `\r`.
fn display_segments(message: &SegmentMessage) -> String {
    message.render().replace('\r', "\n")
}

fn admit_text(first_name: &str, last_name: &str, birth_date: Option<NaiveDate>) -> String {
    let now = Utc::now();
    let patient = NewPatient {
        first_name: first_name.trim().to_string(),
        last_name: last_name.trim().to_string(),
        birth_date: birth_date.unwrap_or_else(|| now.date_naive()),
    };
    let header = translator::front_desk_header(now.naive_utc());
    display_segments(&translator::admit_message(&patient, &header))
}

fn discharge_text(id: &str) -> String {
    let header = translator::front_desk_header(Utc::now().naive_utc());
    display_segments(&translator::discharge_message(id, &header))
}

fn encounter_json(request: &EncounterRequest, status: Option<String>) -> CoreResult<String> {
    let mut encounter = encounter_from_request(request, Utc::now())?;
    if let Some(status) = status {
        encounter.status = Some(status);
    }
    Ok(Encounter::render(&encounter)?)
}

/// Decode either wire format. Input starting with `{` is read as a resource.
fn summarize(input: &str) -> CoreResult<Vec<String>> {
    let input = input.trim();
    if input.starts_with('{') {
        summarize_resource(input)
    } else {
        summarize_segments(input)
    }
}

fn summarize_segments(input: &str) -> CoreResult<Vec<String>> {
    let message = SegmentMessage::parse(input)?;
    let mut lines = vec![
        format!("Trigger: {}", message.trigger()),
        format!("Control ID: {}", message.control_id().unwrap_or("-")),
        format!("Segments: {}", message.segments().len()),
    ];

    match message.trigger() {
        TriggerEvent::Admit => {
            let today = Utc::now().date_naive();
            let patient = translator::patient_from_admit(&AdmitPatient::from_message(&message)?, today);
            lines.push(format!(
                "Patient: {} {}, born {}",
                patient.first_name, patient.last_name, patient.birth_date
            ));
        }
        TriggerEvent::Discharge => {
            let discharge = DischargePatient::from_message(&message)?;
            let id = translator::patient_id_from_discharge(&discharge)?;
            lines.push(format!("Patient ID: {}", id));
        }
        TriggerEvent::Other(code) => {
            lines.push(format!("Unsupported trigger: {}", code));
        }
    }
    Ok(lines)
}

fn summarize_resource(input: &str) -> CoreResult<Vec<String>> {
    let lines = match Resource::parse(input)? {
        Resource::Patient(patient) => {
            let today = Utc::now().date_naive();
            let new = translator::patient_from_resource(&patient, today);
            vec![
                "Resource: Patient".to_string(),
                format!("ID: {}", patient.id.as_deref().unwrap_or("-")),
                format!(
                    "Patient: {} {}, born {}",
                    new.first_name, new.last_name, new.birth_date
                ),
            ]
        }
        Resource::Encounter(encounter) => {
            let mut lines = vec!["Resource: Encounter".to_string()];
            lines.push(encounter_line(&encounter));
            lines
        }
        Resource::Bundle(bundle) => {
            let mut lines = vec![format!("Resource: Bundle ({} entries)", bundle.entries.len())];
            lines.extend(bundle.encounters().map(encounter_line));
            lines
        }
        Resource::Unsupported(resource_type) => {
            vec![format!("Resource: {} (not handled)", resource_type)]
        }
    };
    Ok(lines)
}

fn encounter_line(encounter: &fhir::EncounterResource) -> String {
    let entry = translator::cache_entry_from_encounter(encounter);
    format!(
        "{} | {} | {} | {} | {}",
        entry.patient_ref, entry.doctor_name, entry.visit_date, entry.status, entry.reason
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_text_decodes_back() {
        let birth = NaiveDate::from_ymd_opt(1990, 5, 1).expect("date");
        let text = admit_text("Anna", "Ivanova", Some(birth));
        assert!(text.contains("ADT^A01"));

        let lines = summarize(&text).expect("summary");
        assert_eq!(lines[0], "Trigger: A01");
        assert_eq!(lines[3], "Patient: Anna Ivanova, born 1990-05-01");
    }

    #[test]
    fn test_discharge_summary_shows_id() {
        let lines = summarize(&discharge_text("7")).expect("summary");
        assert_eq!(lines[0], "Trigger: A23");
        assert_eq!(lines[3], "Patient ID: 7");
    }

    #[test]
    fn test_encounter_json_with_status_override() {
        let request = EncounterRequest {
            patient_id: "Patient/3".into(),
            doctor_name: Some("Dr. House".into()),
            reason: Some("Checkup".into()),
            visit_date: Some("2024-05-01".into()),
        };
        let json = encounter_json(&request, Some("planned".into())).expect("encounter");
        let lines = summarize(&json).expect("summary");
        assert_eq!(lines[1], "Patient/3 | Dr. House | 2024-05-01 | planned | Checkup");
    }

    #[test]
    fn test_bundle_summary_lists_encounters() {
        let input = r#"{"resourceType":"Bundle","type":"collection","entry":[
            {"resource":{"resourceType":"Encounter","subject":{"reference":"Patient/1"}}},
            {"resource":{"resourceType":"Observation"}}]}"#;
        let lines = summarize(input).expect("summary");
        assert_eq!(lines[0], "Resource: Bundle (2 entries)");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(summarize("HELLO").is_err());
        assert!(summarize("{not json").is_err());
    }
}
