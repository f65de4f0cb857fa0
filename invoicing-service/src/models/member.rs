//! Member registry record and its mapping onto a boleta client.

use super::boleta::{Client, DNI_DOCUMENT_TYPE};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row of `socio_titulares`, limited to what a lookup needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Member {
    pub id: i64,
    pub dni: String,
    pub nombres: Option<String>,
    #[sqlx(rename = "apellidoPaterno")]
    #[serde(rename = "apellidoPaterno")]
    pub apellido_paterno: Option<String>,
    #[sqlx(rename = "apellidoMaterno")]
    #[serde(rename = "apellidoMaterno")]
    pub apellido_materno: Option<String>,
    #[sqlx(rename = "direccionDNI")]
    #[serde(rename = "direccionDNI")]
    pub direccion_dni: Option<String>,
    #[sqlx(rename = "direccionVivienda")]
    #[serde(rename = "direccionVivienda")]
    pub direccion_vivienda: Option<String>,
    #[sqlx(rename = "distritoDNI")]
    #[serde(rename = "distritoDNI")]
    pub distrito_dni: Option<String>,
    #[sqlx(rename = "distritoVivienda")]
    #[serde(rename = "distritoVivienda")]
    pub distrito_vivienda: Option<String>,
    #[sqlx(rename = "provinciaDNI")]
    #[serde(rename = "provinciaDNI")]
    pub provincia_dni: Option<String>,
    #[sqlx(rename = "provinciaVivienda")]
    #[serde(rename = "provinciaVivienda")]
    pub provincia_vivienda: Option<String>,
    #[sqlx(rename = "regionDNI")]
    #[serde(rename = "regionDNI")]
    pub region_dni: Option<String>,
    #[sqlx(rename = "regionVivienda")]
    #[serde(rename = "regionVivienda")]
    pub region_vivienda: Option<String>,
    pub celular: Option<String>,
}

/// First non-blank value, falling back to an empty string.
fn first_filled(primary: &Option<String>, fallback: &Option<String>) -> String {
    [primary, fallback]
        .into_iter()
        .flatten()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn join_names(parts: &[&Option<String>]) -> String {
    parts
        .iter()
        .filter_map(|p| p.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Member {
    /// Full legal name: given names then both surnames.
    pub fn full_name(&self) -> String {
        join_names(&[&self.nombres, &self.apellido_paterno, &self.apellido_materno])
    }

    /// Client fields populated from this member. Address data prefers what
    /// is printed on the DNI over the declared residence.
    pub fn to_client(&self) -> Client {
        Client {
            document_type: DNI_DOCUMENT_TYPE.to_string(),
            document_number: self.dni.clone(),
            legal_name: self.full_name(),
            trade_name: Some(join_names(&[&self.nombres, &self.apellido_paterno])),
            address: Some(first_filled(&self.direccion_dni, &self.direccion_vivienda)),
            ubigeo: Some(String::new()),
            district: Some(first_filled(&self.distrito_dni, &self.distrito_vivienda)),
            province: Some(first_filled(&self.provincia_dni, &self.provincia_vivienda)),
            department: Some(first_filled(&self.region_dni, &self.region_vivienda)),
            phone: Some(self.celular.clone().unwrap_or_default()),
            email: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn maps_names_and_prefers_dni_address() {
        let member = Member {
            id: 42,
            dni: "12345678".to_string(),
            nombres: s("Ana"),
            apellido_paterno: s("Quispe"),
            apellido_materno: s("Mamani"),
            direccion_dni: s(""),
            direccion_vivienda: s("Av. Sol 123"),
            distrito_dni: s("Wanchaq"),
            distrito_vivienda: s("Santiago"),
            provincia_dni: None,
            provincia_vivienda: s("Cusco"),
            region_dni: s("Cusco"),
            region_vivienda: None,
            celular: s("987654321"),
        };
        let client = member.to_client();
        assert_eq!(client.document_type, "1");
        assert_eq!(client.legal_name, "Ana Quispe Mamani");
        assert_eq!(client.trade_name.as_deref(), Some("Ana Quispe"));
        assert_eq!(client.address.as_deref(), Some("Av. Sol 123"));
        assert_eq!(client.district.as_deref(), Some("Wanchaq"));
        assert_eq!(client.province.as_deref(), Some("Cusco"));
        assert_eq!(client.department.as_deref(), Some("Cusco"));
        assert_eq!(client.ubigeo.as_deref(), Some(""));
        assert_eq!(client.phone.as_deref(), Some("987654321"));
    }

    #[test]
    fn missing_surname_does_not_leave_gaps() {
        let member = Member {
            dni: "87654321".to_string(),
            nombres: s("Luis"),
            apellido_paterno: s("Huamán"),
            ..Default::default()
        };
        assert_eq!(member.full_name(), "Luis Huamán");
        assert_eq!(member.to_client().address.as_deref(), Some(""));
    }
}
