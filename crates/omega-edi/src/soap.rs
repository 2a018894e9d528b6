// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SOAP 1.1 transport for the Pharos EDI service.
//
// Requests are document/literal envelopes POSTed to the ASMX endpoint with a
// `SOAPAction` header of `<namespace><Operation>`.  Responses are read into an
// `xml::Element` tree; a `Body/Fault` becomes `EdiError::Fault`, anything else
// is looked up under `Body/<Operation>Response`.
//
// The envelope prefix must be literally `SOAP-ENV`: the EDI server matches on
// the prefix, not just the namespace URI.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument, trace, warn};

use omega_core::config::ConnectorConfig;
use omega_core::error::{OmegaError, Result};
use omega_core::types::{
    CardLogin, JobDetails, SessionInit, TimezoneInfo, UserDetails, UserPermissions,
};

use crate::service::{EdiError, EdiResult, EdiService, RemoteFault};
use crate::xml::{self, Element};

/// SOAP 1.1 envelope namespace.
const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Name of the header element carrying the session token.
const SESSION_HEADER: &str = "session_id";

/// HTTP client bound to one EDI endpoint.
pub struct SoapTransport {
    /// ASMX endpoint (the WSDL URL without its query string).
    endpoint: String,
    /// Target namespace for operation elements and `SOAPAction`.
    namespace: String,
    http: reqwest::Client,
    /// Session token attached to every request once set.
    session_id: RwLock<Option<String>>,
}

impl SoapTransport {
    /// Build a transport from the connector configuration.  Does no I/O.
    pub fn new(config: &ConnectorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| OmegaError::Connectivity(format!("HTTP client: {e}")))?;
        Ok(Self::with_client(http, &config.wsdl_url(), &config.namespace))
    }

    pub fn with_client(http: reqwest::Client, wsdl_url: &str, namespace: &str) -> Self {
        let endpoint = wsdl_url.split('?').next().unwrap_or(wsdl_url).to_owned();
        Self {
            endpoint,
            namespace: namespace.to_owned(),
            http,
            session_id: RwLock::new(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Render the request envelope for `operation`.
    ///
    /// Parameters with a `None` value are omitted.
    fn envelope(&self, operation: &str, params: &[(&str, Option<&str>)]) -> String {
        let ns = xml::escape(&self.namespace);
        let mut out = String::with_capacity(512);
        out.push_str(r#"<?xml version="1.0" encoding="utf-8"?>"#);
        out.push_str(&format!(r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="{SOAP_ENV_NS}">"#));

        let session = self.session_id.read().ok().and_then(|s| s.clone());
        if let Some(id) = session {
            out.push_str(&format!(
                r#"<SOAP-ENV:Header><{SESSION_HEADER} xmlns="{ns}">{}</{SESSION_HEADER}></SOAP-ENV:Header>"#,
                xml::escape(&id)
            ));
        }

        out.push_str(&format!(r#"<SOAP-ENV:Body><{operation} xmlns="{ns}">"#));
        for (name, value) in params {
            if let Some(value) = value {
                out.push_str(&format!("<{name}>{}</{name}>", xml::escape(value)));
            }
        }
        out.push_str(&format!("</{operation}></SOAP-ENV:Body></SOAP-ENV:Envelope>"));
        out
    }

    /// Perform one call and return the `<OperationResponse>` element.
    async fn call(&self, operation: &str, params: &[(&str, Option<&str>)]) -> EdiResult<Element> {
        let body = self.envelope(operation, params);
        trace!(operation, bytes = body.len(), "sending SOAP request");

        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", format!("\"{}{}\"", self.namespace, operation))
            .body(body)
            .send()
            .await
            .map_err(|e| EdiError::Transport(format!("{operation}: {e}")))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| EdiError::Transport(format!("{operation}: read body: {e}")))?;
        let text = xml::decode_lossy(&bytes);
        trace!(operation, %status, response = %text, "received SOAP response");

        interpret_response(operation, status.is_success(), status.as_u16(), &text)
    }

    /// Call an operation whose result is a single string.
    async fn call_for_text(
        &self,
        operation: &str,
        params: &[(&str, Option<&str>)],
    ) -> EdiResult<String> {
        let response = self.call(operation, params).await?;
        Ok(result_element(&response, operation).text.clone())
    }
}

/// Turn a raw HTTP response body into the operation's response element.
fn interpret_response(operation: &str, success: bool, status: u16, text: &str) -> EdiResult<Element> {
    let envelope = match xml::parse(text) {
        Ok(envelope) => envelope,
        Err(e) if success => {
            return Err(EdiError::Malformed(format!("{operation}: {e}")));
        }
        Err(_) => {
            return Err(EdiError::Transport(format!("{operation} returned HTTP {status}")));
        }
    };

    let body = envelope
        .child("Body")
        .ok_or_else(|| EdiError::Malformed(format!("{operation}: no SOAP body")))?;

    if let Some(fault) = body.child("Fault") {
        let fault = parse_fault(fault);
        debug!(operation, code = %fault.code, message = %fault.message, "SOAP fault");
        return Err(EdiError::Fault(fault));
    }

    if !success {
        return Err(EdiError::Transport(format!("{operation} returned HTTP {status}")));
    }

    let wanted = format!("{operation}Response");
    body.child(&wanted)
        .cloned()
        .ok_or_else(|| EdiError::Malformed(format!("{operation}: missing <{wanted}>")))
}

fn parse_fault(fault: &Element) -> RemoteFault {
    let code = fault.child_text("faultcode").unwrap_or_default();
    // `soap:Server` style codes carry a namespace prefix; vendor codes do not.
    let code = match code.split_once(':') {
        Some((_, local)) => local,
        None => code,
    };
    RemoteFault::new(code, fault.child_text("faultstring").unwrap_or_default())
}

/// The `<OperationResult>` element, or the response itself when the service
/// returns its fields unwrapped.
fn result_element<'a>(response: &'a Element, operation: &str) -> &'a Element {
    response
        .child(&format!("{operation}Result"))
        .unwrap_or(response)
}

/// Text of a named field anywhere in the result.
fn field<'a>(result: &'a Element, name: &str) -> Option<&'a str> {
    result.find(name).map(Element::trimmed_text)
}

fn required_field(result: &Element, operation: &str, name: &str) -> EdiResult<String> {
    field(result, name)
        .map(str::to_owned)
        .ok_or_else(|| EdiError::Malformed(format!("{operation}: missing <{name}>")))
}

/// Collect every childless child element as a name -> text map.
fn leaf_fields(element: &Element) -> BTreeMap<String, String> {
    element
        .children
        .iter()
        .filter(|c| c.children.is_empty())
        .map(|c| (c.name.clone(), c.trimmed_text().to_owned()))
        .collect()
}

fn parse_session_init(response: &Element) -> EdiResult<SessionInit> {
    const OP: &str = "InitializeSession2";
    let result = result_element(response, OP);
    Ok(SessionInit {
        session_id: required_field(result, OP, "session_id")?,
        timezone: TimezoneInfo {
            utc_time: field(result, "utc_time").unwrap_or_default().to_owned(),
            utc_offset: field(result, "utc_offset").unwrap_or_default().to_owned(),
            zone_name: field(result, "time_zone_name").unwrap_or_default().to_owned(),
        },
    })
}

fn parse_user_details(response: &Element) -> EdiResult<UserDetails> {
    const OP: &str = "GetUserDetails3";
    let mut fields = leaf_fields(result_element(response, OP));
    let balance = fields
        .remove("balance")
        .ok_or_else(|| EdiError::Malformed(format!("{OP}: missing <balance>")))?;
    let balance = balance
        .parse::<f64>()
        .map_err(|e| EdiError::Malformed(format!("{OP}: balance {balance:?}: {e}")))?;
    let group = fields.remove("group").unwrap_or_default();
    let active = fields
        .remove("Active")
        .or_else(|| fields.remove("active"))
        .is_some_and(|v| xml::parse_flag(&v));
    Ok(UserDetails {
        balance,
        group,
        active,
        extra: fields,
    })
}

fn parse_job_details(response: &Element) -> JobDetails {
    let result = result_element(response, "GetPrintJobDetails");
    let number = |name: &str| field(result, name).and_then(|v| v.parse::<u32>().ok());
    JobDetails {
        page_count: number("pages"),
        sheet_count: number("sheets"),
        cost: field(result, "cost").and_then(|v| v.parse::<f64>().ok()),
        attributes: result.find("job_attributes").map(leaf_fields),
    }
}

#[async_trait]
impl EdiService for SoapTransport {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn online(&self) -> EdiResult<()> {
        self.call("Online", &[]).await.map(|_| ())
    }

    #[instrument(skip_all)]
    async fn initialize_session(&self, site_password: &str) -> EdiResult<SessionInit> {
        let response = self
            .call("InitializeSession2", &[("site_password", Some(site_password))])
            .await?;
        parse_session_init(&response)
    }

    fn attach_session(&self, session_id: Option<&str>) {
        match self.session_id.write() {
            Ok(mut guard) => *guard = session_id.map(str::to_owned),
            Err(_) => warn!("session header lock poisoned"),
        }
    }

    #[instrument(skip(self))]
    async fn get_pharos_stations(&self, station_name: &str) -> EdiResult<String> {
        self.call_for_text(
            "GetPharosStations2",
            &[("station_id", Some("")), ("name", Some(station_name))],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn configure_session(&self, station_name: &str, bank: &str) -> EdiResult<()> {
        self.call(
            "ConfigureSession3",
            &[("pharos_station", Some(station_name)), ("bank", Some(bank))],
        )
        .await
        .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn ping(&self) -> EdiResult<()> {
        self.call("Ping", &[]).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn get_product_version(&self) -> EdiResult<String> {
        self.call_for_text("GetProductVersion", &[]).await
    }

    #[instrument(skip(self, card_id))]
    async fn login_user(&self, card_id: &str) -> EdiResult<CardLogin> {
        const OP: &str = "LoginUser";
        let response = self
            .call(OP, &[("logon_id", Some(card_id)), ("password", None)])
            .await?;
        let result = result_element(&response, OP);
        Ok(CardLogin {
            access_level: field(result, "access_level").unwrap_or_default().to_owned(),
            refer_id: required_field(result, OP, "refer_id")?,
        })
    }

    #[instrument(skip(self))]
    async fn get_user_details(
        &self,
        username: &str,
        lock_user: bool,
        trans_type: i32,
    ) -> EdiResult<UserDetails> {
        let lock = if lock_user { "1" } else { "0" };
        let trans_type = trans_type.to_string();
        let response = self
            .call(
                "GetUserDetails3",
                &[
                    ("logon_id", Some(username)),
                    ("lock_user", Some(lock)),
                    ("trans_type", Some(trans_type.as_str())),
                ],
            )
            .await?;
        parse_user_details(&response)
    }

    #[instrument(skip(self))]
    async fn delete_print_job(
        &self,
        print_server: &str,
        queue: &str,
        job_id: &str,
    ) -> EdiResult<()> {
        self.call(
            "DeletePrintJob",
            &[
                ("print_server", Some(print_server)),
                ("queue", Some(queue)),
                ("job_id", Some(job_id)),
            ],
        )
        .await
        .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn unlock_user(&self, username: &str) -> EdiResult<()> {
        self.call("UnlockUser", &[("logon_id", Some(username))])
            .await
            .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn get_user_permissions(
        &self,
        username: &str,
        printer_name: &str,
    ) -> EdiResult<UserPermissions> {
        const OP: &str = "GetUserPermissions";
        let response = self
            .call(
                OP,
                &[("logon_id", Some(username)), ("printer", Some(printer_name))],
            )
            .await?;
        Ok(leaf_fields(result_element(&response, OP)))
    }

    #[instrument(skip(self))]
    async fn list_print_jobs_for_station(
        &self,
        print_server: &str,
        station_name: &str,
        username: &str,
    ) -> EdiResult<Vec<u8>> {
        self.call_for_text(
            "ListPrintJobsForStation",
            &[
                ("print_server", Some(print_server)),
                ("pharos_station", Some(station_name)),
                ("logon_id", Some(username)),
            ],
        )
        .await
        .map(String::into_bytes)
    }

    #[instrument(skip(self))]
    async fn get_print_job_details(
        &self,
        print_server: &str,
        queue: &str,
        job_id: &str,
        username: &str,
    ) -> EdiResult<JobDetails> {
        let response = self
            .call(
                "GetPrintJobDetails",
                &[
                    ("print_server", Some(print_server)),
                    ("queue", Some(queue)),
                    ("job_id", Some(job_id)),
                    ("logon_id", Some(username)),
                ],
            )
            .await?;
        Ok(parse_job_details(&response))
    }

    #[instrument(skip(self))]
    async fn release_and_record_print_job(
        &self,
        transaction_id: &str,
        print_server: &str,
        queue: &str,
        job_id: &str,
        station_name: &str,
        username: &str,
    ) -> EdiResult<String> {
        self.call_for_text(
            "ReleaseAndRecordPrintJob3",
            &[
                ("transaction_id", Some(transaction_id)),
                ("print_server", Some(print_server)),
                ("queue", Some(queue)),
                ("job_id", Some(job_id)),
                ("pharos_station", Some(station_name)),
                ("logon_id", Some(username)),
                ("printer", None),
                ("job_attributes", None),
            ],
        )
        .await
        .map(|printer| printer.trim().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> SoapTransport {
        SoapTransport::with_client(
            reqwest::Client::new(),
            "https://edi.example.edu/PharosEdi/EdiService.asmx?WSDL",
            "http://www.pharos.com/PharosEdi/",
        )
    }

    fn wrap(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="{SOAP_ENV_NS}"><soap:Body>{body}</soap:Body></soap:Envelope>"#
        )
    }

    #[test]
    fn endpoint_drops_wsdl_query() {
        assert_eq!(
            transport().endpoint(),
            "https://edi.example.edu/PharosEdi/EdiService.asmx"
        );
    }

    #[test]
    fn envelope_uses_soap_env_prefix_and_escapes_params() {
        let t = transport();
        let env = t.envelope("InitializeSession2", &[("site_password", Some("a<b&c"))]);
        assert!(env.contains("<SOAP-ENV:Envelope xmlns:SOAP-ENV="));
        assert!(env.contains("<site_password>a&lt;b&amp;c</site_password>"));
        assert!(!env.contains("SOAP-ENV:Header"));
    }

    #[test]
    fn envelope_omits_absent_params() {
        let env = transport().envelope("LoginUser", &[("logon_id", Some("1234")), ("password", None)]);
        assert!(env.contains("<logon_id>1234</logon_id>"));
        assert!(!env.contains("password"));
    }

    #[test]
    fn session_header_follows_attach_and_clear() {
        let t = transport();
        t.attach_session(Some("abc-123"));
        let env = t.envelope("Ping", &[]);
        assert!(env.contains("<SOAP-ENV:Header><session_id xmlns=\"http://www.pharos.com/PharosEdi/\">abc-123</session_id></SOAP-ENV:Header>"));

        t.attach_session(None);
        assert!(!t.envelope("Ping", &[]).contains("session_id"));
    }

    #[test]
    fn fault_is_extracted_with_prefix_stripped() {
        let text = wrap(
            "<soap:Fault><faultcode>soap:Server</faultcode><faultstring>The session is not running.</faultstring></soap:Fault>",
        );
        match interpret_response("Ping", false, 500, &text) {
            Err(EdiError::Fault(f)) => {
                assert_eq!(f.code, "Server");
                assert_eq!(f.message, "The session is not running.");
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn vendor_fault_code_is_kept() {
        let text = wrap(
            "<soap:Fault><faultcode>Pedi.InternalError</faultcode><faultstring>An internal server error occurred. boom</faultstring></soap:Fault>",
        );
        let Err(EdiError::Fault(f)) = interpret_response("GetUserDetails3", false, 500, &text) else {
            panic!("expected fault");
        };
        assert_eq!(f.code, "Pedi.InternalError");
    }

    #[test]
    fn http_error_without_envelope_is_transport() {
        let result = interpret_response("Ping", false, 503, "Service Unavailable");
        assert!(matches!(result, Err(EdiError::Transport(_))));
    }

    #[test]
    fn missing_response_element_is_malformed() {
        let result = interpret_response("Ping", true, 200, &wrap("<Other/>"));
        assert!(matches!(result, Err(EdiError::Malformed(_))));
    }

    #[test]
    fn session_init_fields_are_read() {
        let text = wrap(
            r#"<InitializeSession2Response xmlns="urn:x"><InitializeSession2Result>
                 <session_id>S-42</session_id><utc_time>2013-02-14T14:00:00</utc_time>
                 <utc_offset>-300</utc_offset><time_zone_name>Eastern Standard Time</time_zone_name>
               </InitializeSession2Result></InitializeSession2Response>"#,
        );
        let response = interpret_response("InitializeSession2", true, 200, &text).expect("response");
        let init = parse_session_init(&response).expect("init");
        assert_eq!(init.session_id, "S-42");
        assert_eq!(init.timezone.utc_offset, "-300");
        assert_eq!(init.timezone.zone_name, "Eastern Standard Time");
    }

    #[test]
    fn user_details_are_read() {
        let text = wrap(
            r#"<GetUserDetails3Response><GetUserDetails3Result>
                 <balance>12.34</balance><group>student</group><Active>1</Active><last_name>Doe</last_name>
               </GetUserDetails3Result></GetUserDetails3Response>"#,
        );
        let response = interpret_response("GetUserDetails3", true, 200, &text).expect("response");
        let details = parse_user_details(&response).expect("details");
        assert_eq!(details.balance, 12.34);
        assert_eq!(details.group, "student");
        assert!(details.active);
        assert_eq!(details.extra.get("last_name").map(String::as_str), Some("Doe"));
    }

    #[test]
    fn user_details_without_balance_is_malformed() {
        let text = wrap("<GetUserDetails3Response><GetUserDetails3Result><group>x</group></GetUserDetails3Result></GetUserDetails3Response>");
        let response = interpret_response("GetUserDetails3", true, 200, &text).expect("response");
        assert!(matches!(parse_user_details(&response), Err(EdiError::Malformed(_))));
    }

    #[test]
    fn job_details_tolerate_missing_fields() {
        let text = wrap(
            r#"<GetPrintJobDetailsResponse><GetPrintJobDetailsResult>
                 <pages>4</pages><cost>0.40</cost>
                 <job_attributes><duplex>true</duplex><color>false</color></job_attributes>
               </GetPrintJobDetailsResult></GetPrintJobDetailsResponse>"#,
        );
        let response = interpret_response("GetPrintJobDetails", true, 200, &text).expect("response");
        let details = parse_job_details(&response);
        assert_eq!(details.page_count, Some(4));
        assert_eq!(details.sheet_count, None);
        assert_eq!(details.cost, Some(0.40));
        let attrs = details.attributes.expect("attributes");
        assert_eq!(attrs.get("duplex").map(String::as_str), Some("true"));
    }
}
