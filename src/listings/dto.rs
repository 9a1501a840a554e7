use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::auth::dto::FormError;
use crate::auth::repo::SessionUser;
use crate::listings::repo::{
    Category, ListingDetail, ListingInput, ListingSummary, PriceRange,
};

/// Raw listing form. Numeric fields arrive as strings so that a bad select
/// value re-renders the form instead of failing deserialization; the whole
/// form serializes back into the re-rendered view so no field is lost.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListingForm {
    pub titulo: String,
    pub descripcion: String,
    pub categoria: String,
    pub precio: String,
    pub habitaciones: String,
    pub estacionamiento: String,
    pub wc: String,
    #[serde(default)]
    pub calle: Option<String>,
    #[serde(default)]
    pub lat: String,
    #[serde(default)]
    pub lng: String,
}

impl ListingForm {
    pub fn validate(&self) -> Result<ListingInput, Vec<FormError>> {
        let mut errors = Vec::new();

        if self.titulo.trim().is_empty() {
            errors.push(FormError::new("El título es obligatorio"));
        }
        if self.descripcion.trim().is_empty() {
            errors.push(FormError::new("La descripción no puede ir vacía"));
        } else if self.descripcion.len() > 200 {
            errors.push(FormError::new("La descripción es muy larga"));
        }

        let category_id = numeric(&self.categoria, &mut errors, "Selecciona una Categoría");
        let price_id = numeric(&self.precio, &mut errors, "Selecciona un Precio");
        let rooms = numeric(
            &self.habitaciones,
            &mut errors,
            "Selecciona el número de habitaciones",
        );
        let parking = numeric(
            &self.estacionamiento,
            &mut errors,
            "Selecciona el número de estacionamientos",
        );
        let bathrooms = numeric(&self.wc, &mut errors, "Selecciona el número de baños");

        if self.lat.trim().is_empty() {
            errors.push(FormError::new("Ubica la propiedad en el mapa"));
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ListingInput {
            title: self.titulo.trim().to_string(),
            description: self.descripcion.trim().to_string(),
            category_id: category_id.unwrap_or_default(),
            price_id: price_id.unwrap_or_default(),
            rooms: rooms.unwrap_or_default(),
            parking: parking.unwrap_or_default(),
            bathrooms: bathrooms.unwrap_or_default(),
            street: self.calle.as_deref().map(|s| s.trim().to_string()),
            lat: self.lat.trim().to_string(),
            lng: self.lng.trim().to_string(),
        })
    }
}

fn numeric(raw: &str, errors: &mut Vec<FormError>, msg: &str) -> Option<i32> {
    match raw.trim().parse::<i32>() {
        Ok(v) => Some(v),
        Err(_) => {
            errors.push(FormError::new(msg));
            None
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageForm {
    pub mensaje: String,
}

impl MessageForm {
    pub fn validate(&self) -> Vec<FormError> {
        if self.mensaje.trim().chars().count() < 10 {
            vec![FormError::new(
                "El mensaje no puede ir vacío o es muy corto",
            )]
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub pagina: Option<String>,
}

/// Owner dashboard view.
#[derive(Debug, Serialize)]
pub struct AdminView {
    pub pagina: String,
    pub propiedades: Vec<ListingSummary>,
    pub paginas: i64,
    pub pagina_actual: i64,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Create/edit form view: catalogs plus any errors and the submitted data.
#[derive(Debug, Serialize)]
pub struct ListingFormView {
    pub pagina: String,
    pub categorias: Vec<Category>,
    pub precios: Vec<PriceRange>,
    pub errores: Vec<FormError>,
    pub datos: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct AddImageView {
    pub pagina: String,
    pub propiedad: ListingDetail,
}

/// Public listing page.
#[derive(Debug, Serialize)]
pub struct ShowView {
    pub pagina: String,
    pub propiedad: ListingDetail,
    pub usuario: Option<SessionUser>,
    pub es_vendedor: bool,
    pub errores: Vec<FormError>,
}

#[derive(Debug, Serialize)]
pub struct MessagesView {
    pub pagina: String,
    pub mensajes: Vec<MessageEntry>,
}

#[derive(Debug, Serialize)]
pub struct MessageEntry {
    pub mensaje: String,
    pub usuario: String,
    pub fecha: String,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub resultado: &'static str,
}

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Long-form Spanish date for the messages view.
pub fn format_date(date: OffsetDateTime) -> String {
    format!(
        "{} de {} de {}",
        date.day(),
        MONTHS[date.month() as usize - 1],
        date.year()
    )
}
