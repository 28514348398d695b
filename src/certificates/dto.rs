use serde::Serialize;

use super::repo_types::{Certificate, VerifiedCertificate};
use super::services::Eligibility;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateStatusResponse {
    pub success: bool,
    pub certificate: Option<Certificate>,
    pub has_certificate: bool,
    pub eligibility: Eligibility,
}

#[derive(Debug, Serialize)]
pub struct IssuedCertificateResponse {
    pub success: bool,
    pub message: &'static str,
    pub certificate: Certificate,
}

#[derive(Debug, Serialize)]
pub struct CertificateListResponse {
    pub success: bool,
    pub certificates: Vec<Certificate>,
}

#[derive(Debug, Serialize)]
pub struct VerifyCertificateResponse {
    pub success: bool,
    pub valid: bool,
    pub certificate: Option<VerifiedCertificate>,
}
