//! Boleta form values, the normalised API payload and the issuance result.

use crate::tax;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// Document type code for a national identity document (DNI).
pub const DNI_DOCUMENT_TYPE: &str = "1";

/// Minimum DNI length that triggers a member lookup.
pub const DNI_MIN_LENGTH: usize = 8;

/// Message attached to the form when income linkage is incomplete.
pub const INCOME_LINKAGE_MESSAGE: &str =
    "La fecha, número de operación y cuenta son requeridos para registrar el ingreso.";

/// Buyer identity as captured by the form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Client {
    #[serde(rename = "tipo_documento")]
    #[validate(length(min = 1, message = "Seleccione un tipo de documento."))]
    pub document_type: String,

    #[serde(rename = "numero_documento")]
    #[validate(length(min = 1, message = "El número de documento es requerido."))]
    pub document_number: String,

    #[serde(rename = "razon_social")]
    #[validate(length(min = 1, message = "La razón social o nombre es requerido."))]
    pub legal_name: String,

    #[serde(rename = "nombre_comercial", default)]
    pub trade_name: Option<String>,

    #[serde(rename = "direccion", default)]
    pub address: Option<String>,

    #[serde(default)]
    pub ubigeo: Option<String>,

    #[serde(rename = "distrito", default)]
    pub district: Option<String>,

    #[serde(rename = "provincia", default)]
    pub province: Option<String>,

    #[serde(rename = "departamento", default)]
    pub department: Option<String>,

    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,

    /// A blank input means no email.
    #[serde(default, deserialize_with = "blank_text")]
    #[validate(email(message = "Email inválido."))]
    pub email: Option<String>,
}

impl Client {
    /// Whether this client identifies a person by DNI.
    pub fn is_dni(&self) -> bool {
        self.document_type == DNI_DOCUMENT_TYPE
    }

    /// Blank every field that a member lookup would fill.
    ///
    /// Email is not part of the registry record and is kept.
    pub fn clear_lookup_fields(&mut self) {
        self.legal_name.clear();
        self.trade_name = None;
        self.address = None;
        self.district = None;
        self.province = None;
        self.department = None;
        self.ubigeo = None;
        self.phone = None;
    }
}

/// One sold product or service, priced tax-inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LineItem {
    #[serde(rename = "codigo", default)]
    pub code: Option<String>,

    #[serde(rename = "descripcion")]
    #[validate(length(min = 1, message = "La descripción es requerida."))]
    pub description: String,

    #[serde(rename = "unidad")]
    #[validate(length(min = 1, message = "La unidad es requerida (ej: NIU)."))]
    pub unit: String,

    #[serde(rename = "cantidad")]
    #[validate(custom(function = "validate_quantity"))]
    pub quantity: Decimal,

    /// Tax-inclusive unit price entered by the user.
    #[serde(rename = "mto_valor_unitario")]
    #[validate(custom(function = "validate_price"))]
    pub unit_price: Decimal,

    #[serde(rename = "porcentaje_igv", default = "default_igv")]
    #[validate(custom(function = "validate_tax_percentage"))]
    pub tax_percentage: Decimal,

    #[serde(rename = "tip_afe_igv")]
    #[validate(length(min = 1, message = "Seleccione un tipo de afectación."))]
    pub tax_affectation: String,

    #[serde(rename = "codigo_producto_sunat", default)]
    pub sunat_product_code: Option<String>,
}

impl LineItem {
    /// Tax-exclusive unit value sent to the billing API.
    pub fn base_value(&self) -> Decimal {
        tax::base_value(self.unit_price, self.tax_percentage)
    }
}

fn default_igv() -> Decimal {
    tax::DEFAULT_IGV_PERCENTAGE
}

/// Everything the user has typed into a boleta form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_income_linkage", skip_on_field_errors = false))]
pub struct BoletaFormValues {
    pub serie: String,

    #[serde(rename = "fecha_emision")]
    pub issue_date: NaiveDate,

    #[serde(rename = "moneda")]
    #[validate(length(min = 1, message = "Seleccione una moneda."))]
    pub currency: String,

    #[serde(rename = "tipo_operacion")]
    pub operation_type: String,

    #[serde(rename = "metodo_envio")]
    pub send_method: String,

    #[serde(rename = "forma_pago_tipo")]
    pub payment_form: String,

    #[serde(rename = "usuario_creacion")]
    pub created_by: String,

    #[validate(nested)]
    pub client: Client,

    #[serde(rename = "detalles")]
    #[validate(
        length(min = 1, message = "Debe agregar al menos un producto o servicio."),
        nested
    )]
    pub items: Vec<LineItem>,

    #[serde(default = "default_true")]
    pub create_income_record: bool,

    #[serde(default, deserialize_with = "blank_date")]
    pub income_date: Option<NaiveDate>,

    #[serde(rename = "income_numero_operacion", default)]
    pub income_operation_number: Option<String>,

    #[serde(default)]
    pub income_account: Option<String>,
}

impl BoletaFormValues {
    /// Income linkage fields, present only when the user opted in and
    /// filled all three.
    pub fn income_linkage(&self) -> Option<IncomeLinkage<'_>> {
        if !self.create_income_record {
            return None;
        }
        let date = self.income_date?;
        let operation_number = non_blank(self.income_operation_number.as_deref())?;
        let account = non_blank(self.income_account.as_deref())?;
        Some(IncomeLinkage {
            date,
            operation_number,
            account,
        })
    }

    /// Total charged to the buyer, tax included.
    pub fn sale_total(&self) -> Decimal {
        tax::sale_total(&self.items)
    }
}

/// Borrowed view over complete income linkage fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncomeLinkage<'a> {
    pub date: NaiveDate,
    pub operation_number: &'a str,
    pub account: &'a str,
}

fn default_true() -> bool {
    true
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Date inputs post an empty string when cleared.
fn blank_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<NaiveDate>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Text inputs post an empty string when cleared.
fn blank_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}

fn with_message(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

fn validate_quantity(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::new(1, 2) {
        return Err(with_message("range", "La cantidad debe ser mayor a 0."));
    }
    Ok(())
}

fn validate_price(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(with_message("range", "El precio no puede ser negativo."));
    }
    Ok(())
}

fn validate_tax_percentage(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(with_message("range", "El % IGV no puede ser negativo."));
    }
    Ok(())
}

fn validate_income_linkage(values: &BoletaFormValues) -> Result<(), ValidationError> {
    if values.create_income_record && values.income_linkage().is_none() {
        return Err(with_message("income_linkage", INCOME_LINKAGE_MESSAGE));
    }
    Ok(())
}

/// A single validation failure flattened to a dotted field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

/// Flatten nested validation errors into `client.email`, `detalles[0].cantidad`
/// style paths.
pub fn flatten_issues(errors: &ValidationErrors) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    collect_issues(errors, String::new(), &mut issues);
    issues.sort_by(|a, b| a.field.cmp(&b.field));
    issues
}

fn collect_issues(errors: &ValidationErrors, prefix: String, out: &mut Vec<FieldIssue>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    out.push(FieldIssue {
                        field: path.clone(),
                        message: error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| error.code.to_string()),
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_issues(inner, path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_issues(inner, format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

/// Client as sent to the billing API: optional text always present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientPayload {
    pub tipo_documento: String,
    pub numero_documento: String,
    pub razon_social: String,
    pub nombre_comercial: String,
    pub direccion: String,
    pub ubigeo: String,
    pub distrito: String,
    pub provincia: String,
    pub departamento: String,
    pub telefono: String,
    pub email: String,
}

/// Line item as sent to the billing API, priced tax-exclusive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItemPayload {
    pub codigo: String,
    pub descripcion: String,
    pub unidad: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub cantidad: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub mto_valor_unitario: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub porcentaje_igv: Decimal,
    pub tip_afe_igv: String,
    pub codigo_producto_sunat: String,
}

/// Normalised issuance request. Built once per submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoletaPayload {
    company_id: String,
    branch_id: String,
    serie: String,
    fecha_emision: String,
    moneda: String,
    tipo_operacion: String,
    metodo_envio: String,
    forma_pago_tipo: String,
    usuario_creacion: String,
    client: ClientPayload,
    detalles: Vec<LineItemPayload>,
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

impl BoletaPayload {
    pub fn build(values: &BoletaFormValues, company_id: &str, branch_id: &str) -> Self {
        let client = &values.client;
        Self {
            company_id: company_id.to_string(),
            branch_id: branch_id.to_string(),
            serie: values.serie.clone(),
            fecha_emision: values.issue_date.format("%Y-%m-%d").to_string(),
            moneda: values.currency.clone(),
            tipo_operacion: values.operation_type.clone(),
            metodo_envio: values.send_method.clone(),
            forma_pago_tipo: values.payment_form.clone(),
            usuario_creacion: values.created_by.clone(),
            client: ClientPayload {
                tipo_documento: client.document_type.clone(),
                numero_documento: client.document_number.clone(),
                razon_social: client.legal_name.clone(),
                nombre_comercial: text(&client.trade_name),
                direccion: text(&client.address),
                ubigeo: text(&client.ubigeo),
                distrito: text(&client.district),
                provincia: text(&client.province),
                departamento: text(&client.department),
                telefono: text(&client.phone),
                email: text(&client.email),
            },
            detalles: values
                .items
                .iter()
                .map(|item| LineItemPayload {
                    codigo: text(&item.code),
                    descripcion: item.description.clone(),
                    unidad: item.unit.clone(),
                    cantidad: item.quantity,
                    mto_valor_unitario: item.base_value(),
                    porcentaje_igv: item.tax_percentage,
                    tip_afe_igv: item.tax_affectation.clone(),
                    codigo_producto_sunat: text(&item.sunat_product_code),
                })
                .collect(),
        }
    }

    pub fn client(&self) -> &ClientPayload {
        &self.client
    }

    pub fn items(&self) -> &[LineItemPayload] {
        &self.detalles
    }

    pub fn company_id(&self) -> &str {
        &self.company_id
    }
}

/// Result of a successful issuance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedBoleta {
    pub id: i64,
    pub numero_completo: String,
    #[serde(default)]
    pub pdf_path: Option<String>,
    #[serde(default)]
    pub xml_path: Option<String>,
    #[serde(default)]
    pub cdr_path: Option<String>,
    #[serde(default)]
    pub sunat_status: Option<String>,
}

/// PDF layout offered by the billing API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PdfFormat {
    #[default]
    A4,
    Ticket,
}

impl PdfFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfFormat::A4 => "A4",
            PdfFormat::Ticket => "TICKET",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn form_json() -> serde_json::Value {
        json!({
            "serie": "B001",
            "fecha_emision": "2025-07-28",
            "moneda": "PEN",
            "tipo_operacion": "0101",
            "metodo_envio": "individual",
            "forma_pago_tipo": "Contado",
            "usuario_creacion": "admin_user",
            "client": {
                "tipo_documento": "1",
                "numero_documento": "12345678",
                "razon_social": "Ana Quispe Mamani"
            },
            "detalles": [{
                "descripcion": "Cuota mensual",
                "unidad": "NIU",
                "cantidad": 2,
                "mto_valor_unitario": "118",
                "porcentaje_igv": 18,
                "tip_afe_igv": "10"
            }],
            "create_income_record": true,
            "income_date": "2025-07-28",
            "income_numero_operacion": "OP-991",
            "income_account": "Caja Principal"
        })
    }

    fn form() -> BoletaFormValues {
        serde_json::from_value(form_json()).unwrap()
    }

    fn messages(values: &BoletaFormValues) -> Vec<FieldIssue> {
        values
            .validate()
            .map(|_| Vec::new())
            .unwrap_or_else(|e| flatten_issues(&e))
    }

    #[test]
    fn complete_form_is_valid() {
        assert!(form().validate().is_ok());
    }

    #[test]
    fn empty_items_fail_with_item_message() {
        let mut values = form();
        values.items.clear();
        let issues = messages(&values);
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].message,
            "Debe agregar al menos un producto o servicio."
        );
    }

    #[test]
    fn missing_income_field_gives_one_consolidated_message() {
        for strip in ["income_date", "income_numero_operacion", "income_account"] {
            let mut raw = form_json();
            raw[strip] = json!("");
            let values: BoletaFormValues = serde_json::from_value(raw).unwrap();
            let issues = messages(&values);
            assert_eq!(issues.len(), 1, "stripping {strip}: {issues:?}");
            assert_eq!(issues[0].message, INCOME_LINKAGE_MESSAGE);
        }
    }

    #[test]
    fn income_fields_are_ignored_when_not_opted_in() {
        let mut values = form();
        values.create_income_record = false;
        values.income_account = None;
        assert!(values.validate().is_ok());
        assert!(values.income_linkage().is_none());
    }

    #[test]
    fn item_rules_are_field_scoped() {
        let mut values = form();
        values.items[0].quantity = Decimal::ZERO;
        values.items[0].unit_price = dec("-1");
        values.items[0].description.clear();
        let issues = messages(&values);
        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(|i| i.field.contains("[0].")));
        let mut texts: Vec<String> = issues.into_iter().map(|i| i.message).collect();
        texts.sort();
        assert_eq!(
            texts,
            vec![
                "El precio no puede ser negativo.",
                "La cantidad debe ser mayor a 0.",
                "La descripción es requerida.",
            ]
        );
    }

    #[test]
    fn email_may_be_empty_but_not_malformed() {
        let mut values = form();
        values.client.email = None;
        assert!(values.validate().is_ok());
        values.client.email = Some("ana@correo.pe".to_string());
        assert!(values.validate().is_ok());
        for malformed in ["ana-at-correo", "ana@@correo.pe", "ana @correo.pe"] {
            values.client.email = Some(malformed.to_string());
            let issues = messages(&values);
            assert_eq!(issues.len(), 1, "{malformed}");
            assert_eq!(issues[0].field, "client.email");
            assert_eq!(issues[0].message, "Email inválido.");
        }
    }

    #[test]
    fn blank_email_input_deserializes_as_no_email() {
        let client: Client = serde_json::from_value(json!({
            "tipo_documento": "1",
            "numero_documento": "12345678",
            "razon_social": "Ana Torres",
            "email": "  "
        }))
        .unwrap();
        assert_eq!(client.email, None);
        assert!(client.validate().is_ok());
    }

    #[test]
    fn payload_uses_base_value_and_blank_optionals() {
        let payload = BoletaPayload::build(&form(), "1", "1");
        let item = &payload.items()[0];
        assert_eq!(item.mto_valor_unitario, dec("100.00"));
        assert_eq!(item.codigo, "");
        assert_eq!(payload.client().direccion, "");
        assert_eq!(payload.client().email, "");

        let raw = serde_json::to_value(&payload).unwrap();
        assert_eq!(raw["detalles"][0]["mto_valor_unitario"], json!(100.0));
        assert_eq!(raw["client"]["nombre_comercial"], json!(""));
        assert_eq!(raw["fecha_emision"], json!("2025-07-28"));
        assert_eq!(raw["company_id"], json!("1"));
    }

    #[test]
    fn sale_total_uses_entered_prices() {
        assert_eq!(form().sale_total(), dec("236.00"));
    }

    #[test]
    fn pdf_format_wire_names() {
        assert_eq!(serde_json::to_value(PdfFormat::Ticket).unwrap(), json!("TICKET"));
        let parsed: PdfFormat = serde_json::from_value(json!("A4")).unwrap();
        assert_eq!(parsed, PdfFormat::A4);
    }
}
