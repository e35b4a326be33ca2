//! # FedBot CRM
//! Salesforce-backed [`CaseSource`](fedbot_core::CaseSource): SOAP login,
//! SOQL query builders, REST queries with pagination and record parsing.

pub mod records;
pub mod salesforce;
pub mod soql;

pub use salesforce::SalesforceClient;
