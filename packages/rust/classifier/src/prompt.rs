//! Category rule set and request construction.

use leadflow_shared::{ClassificationRequest, InputRecord};

/// Fixed instructions sent with every classification request.
pub const CATEGORY_RULES: &str = "\
You classify hospitality contacts into exactly one persona.

Personas:
- Owner: ownership titles such as Owner, Co-Owner, Founder, Co-Founder, Proprietor, Partner, Managing Partner, Principal.
- Operations: beverage and operations titles such as Bar Manager, Beverage Director, Beverage Manager, Head Bartender, Bartender, Sommelier, General Manager, Operations Manager, Director of Operations.
- Procurement: purchasing and sourcing titles such as Purchasing Manager, Buyer, Procurement Manager, Sourcing Manager, Supply Chain Manager.
- Other: every title that fits none of the above.

Rules:
- If a title holds more than one role (for example \"Owner & Bar Manager\"), Owner takes priority.
- Judge by the job title first; use the company only to break ties.
- Answer with one word only: Owner, Operations, Procurement, or Other.";

/// Describe a record in plain language for the classification service.
pub fn describe_record(record: &InputRecord) -> String {
    let name = record.full_name();
    let name = if name.is_empty() { "Unknown" } else { name.as_str() };
    let title = if record.job_title.is_empty() {
        "(no title given)"
    } else {
        record.job_title.as_str()
    };
    let company = if record.company.is_empty() {
        "(no company given)"
    } else {
        record.company.as_str()
    };

    format!("Name: {name}\nJob title: {title}\nCompany: {company}\n\nWhich persona is this contact?")
}

/// Build the full request for one record.
pub fn build_request(record: &InputRecord) -> ClassificationRequest {
    ClassificationRequest {
        instructions: CATEGORY_RULES.to_string(),
        description: describe_record(record),
    }
}
