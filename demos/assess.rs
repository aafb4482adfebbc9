//! Run a five-year assessment and print the result bundle

fn main() {
    let json = r#"{
        "trips": [
            { "id": "t1", "outDate": "2023-03-01", "inDate": "2023-03-15", "outRoute": "LHR-JFK", "inRoute": "JFK-LHR" },
            { "id": "t2", "outDate": "2024-07-10", "inDate": "2024-08-02" },
            { "id": "t3", "outDate": "2025-12-20", "inDate": "2026-01-04" }
        ],
        "visaStartDate": "2023-01-01",
        "vignetteEntryDate": "2023-02-15",
        "ilrTrack": 5
    }"#;

    match ilr_flux::ilr_to_json(json.to_string()) {
        Ok(result) => print!("{result}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
