//! SOQL builders for the two queries FedBot runs.

/// Case fields read for the queue snapshot.
pub const QUEUE_FIELDS: &[&str] = &[
    "CaseNumber",
    "Id",
    "toLabel(Priority)",
    "toLabel(Status)",
    "First_Response_Due_In_in_minutes__c",
    "GSS_First_Resp_Met__c",
    "Name_of_Entitlement__c",
    "Case_Idle_Time_Business_Days__c",
    "EP_Bug_URL__c",
    "EA_Name__c",
    "Case_Owner_Name__c",
    "GSS_Case__c",
    "Description",
];

/// Case fields read for the idle-time report.
pub const IDLE_FIELDS: &[&str] = &[
    "CaseNumber",
    "Id",
    "Case_Owner_Name__c",
    "Case_Idle_Time_Business_Days__c",
    "toLabel(Status)",
    "EP_Bug_URL__c",
];

/// Quote a value as a SOQL string literal.
pub fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// All cases owned by the queue, in case-number order.
pub fn queue_query(queue_owner_id: &str) -> String {
    format!(
        "SELECT {} FROM Case WHERE OwnerId = {} ORDER BY CaseNumber ASC NULLS FIRST, Id ASC NULLS FIRST",
        QUEUE_FIELDS.join(", "),
        quote(queue_owner_id)
    )
}

/// Open cases of `owners` idle longer than `min_idle_days` with no bug link.
pub fn idle_query(owners: &[String], min_idle_days: f64) -> String {
    let owner_list = owners
        .iter()
        .map(|o| quote(o))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {} FROM Case WHERE Case_Owner_Name__c IN ({}) \
         AND Case_Idle_Time_Business_Days__c > {} \
         AND Status != 'Closed' AND EP_Bug_URL__c = null \
         ORDER BY CaseNumber ASC NULLS FIRST",
        IDLE_FIELDS.join(", "),
        owner_list,
        min_idle_days
    )
}
