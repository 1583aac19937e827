#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::{Path, PathBuf};

fn patent(id: &str, date: &str, applicants: &[(&str, &str)], cpc: &[&str]) -> Value {
    json!({
        "id": id,
        "title": format!("Quantum computing processor {}", id),
        "abstract": "Superconducting qubits for quantum computing.",
        "publication_date": date,
        "filing_country": applicants.first().map(|a| a.1).unwrap_or(""),
        "applicants": applicants
            .iter()
            .map(|(name, country)| json!({"name": name, "country": country}))
            .collect::<Vec<_>>(),
        "cpc_codes": cpc,
    })
}

fn project(id: &str, start: &str, programme: &str, scheme: &str, funding: f64, orgs: &[(&str, &str, &str, bool, &str)]) -> Value {
    json!({
        "id": id,
        "title": format!("Quantum computing network {}", id),
        "objective": "Build quantum computing testbeds.",
        "start_date": start,
        "programme": programme,
        "funding_scheme": scheme,
        "ec_contribution": funding,
        "organizations": orgs
            .iter()
            .map(|(name, country, city, is_sme, role)| json!({
                "name": name,
                "country": country,
                "city": city,
                "is_sme": is_sme,
                "role": role,
            }))
            .collect::<Vec<_>>(),
    })
}

/// Small quantum-computing dataset: six patents 2018-2023 and four projects.
pub fn snapshot_json() -> Value {
    json!({
        "patents": [
            patent("EP100", "2018-02-14", &[("IBM", "US")], &["G06N10/00", "H01L39/22"]),
            patent("EP101", "2019-03-01", &[("IBM", "US"), ("ETH Zurich", "CH")], &["G06N10/00", "B82Y10/00"]),
            patent("EP102", "2020-06-11", &[("Google", "US")], &["G06N10/40", "H01L39/22"]),
            patent("EP103", "2021-09-30", &[("Siemens", "DE"), ("IBM", "US")], &["H04L9/08", "G06N10/00"]),
            patent("EP104", "2022-04-19", &[("Google", "US")], &["G06N10/20"]),
            patent("EP105", "2023-11-21", &[("Alpine Quantum", "AT")], &["G06N10/00", "H04L9/08"]),
            json!({
                "id": "EP900",
                "title": "Battery electrode",
                "publication_date": "2021-01-01",
                "applicants": [{"name": "Cellco", "country": "KR"}],
                "cpc_codes": ["H01M4/00"],
            }),
        ],
        "projects": [
            project("P1", "2018-05-01", "H2020", "RIA", 2_500_000.0, &[
                ("Siemens", "DE", "Munich", false, "coordinator"),
                ("ETH Zurich", "CH", "Zurich", false, "participant"),
            ]),
            project("P2", "2020-01-01", "H2020", "CSA", 750_000.0, &[
                ("Qubitech", "FR", "Paris", true, "coordinator"),
                ("Siemens", "DE", "Munich", false, "participant"),
                ("Alpine Quantum", "AT", "Innsbruck", true, "participant"),
            ]),
            project("P3", "2022-03-01", "HORIZON", "RIA", 4_000_000.0, &[
                ("ETH Zurich", "CH", "Zurich", false, "coordinator"),
                ("Qubitech", "FR", "Paris", true, "participant"),
                ("Alpine Quantum", "AT", "Innsbruck", true, "participant"),
            ]),
            project("P4", "2023-02-01", "HORIZON", "ERC", 1_500_000.0, &[
                ("ETH Zurich", "CH", "Zurich", false, "coordinator"),
            ]),
        ],
    })
}

pub fn write_snapshot(dir: &Path) -> PathBuf {
    let path = dir.join("snapshot.json");
    std::fs::write(&path, serde_json::to_string_pretty(&snapshot_json()).unwrap()).unwrap();
    path
}

/// TOML with the snapshot path and reference year filled in; OpenAIRE and
/// GLEIF disabled, Semantic Scholar pointed at `citations_endpoint`.
pub fn radar_toml(snapshot: &Path, citations_endpoint: &str) -> String {
    format!(
        r#"
[radar]
timeout_seconds = 10
reference_year = 2025

[data]
snapshot_path = "{}"

[semantic_scholar]
enabled = true
endpoint = "{}"
timeout_seconds = 2
"#,
        snapshot.display(),
        citations_endpoint
    )
}
