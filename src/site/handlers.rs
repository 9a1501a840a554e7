use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    error::AppError,
    listings::repo::{Category, Listing, ListingDetail, PriceRange},
    state::AppState,
};

pub fn site_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/categorias/:id", get(by_category))
        .route("/buscador", post(search))
        .route("/404", get(not_found))
}

#[derive(Debug, Serialize)]
struct HomeView {
    pagina: String,
    categorias: Vec<Category>,
    precios: Vec<PriceRange>,
    casas: Vec<ListingDetail>,
    departamentos: Vec<ListingDetail>,
}

#[derive(Debug, Serialize)]
struct ResultsView {
    pagina: String,
    propiedades: Vec<ListingDetail>,
}

#[derive(Debug, Serialize)]
pub struct NotFoundView {
    pagina: String,
}

#[derive(Debug, Deserialize)]
struct SearchForm {
    termino: String,
}

// Category ids 1 and 2 are seeded as houses and apartments.
const HOUSES: i32 = 1;
const APARTMENTS: i32 = 2;

#[instrument(skip(state))]
async fn home(State(state): State<AppState>) -> Result<Json<HomeView>, AppError> {
    let categorias = Category::all(&state.db).await?;
    let precios = PriceRange::all(&state.db).await?;
    let casas = Listing::latest_published_in_category(&state.db, HOUSES, 3).await?;
    let departamentos = Listing::latest_published_in_category(&state.db, APARTMENTS, 3).await?;

    Ok(Json(HomeView {
        pagina: "Inicio".into(),
        categorias,
        precios,
        casas,
        departamentos,
    }))
}

#[instrument(skip(state))]
async fn by_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    let Some(category) = Category::find_by_id(&state.db, id).await? else {
        return Ok(Redirect::to("/404").into_response());
    };

    let propiedades = Listing::published_in_category(&state.db, category.id).await?;
    Ok(Json(ResultsView {
        pagina: format!("{}s en Venta", category.name),
        propiedades,
    })
    .into_response())
}

#[instrument(skip(state, form))]
async fn search(
    State(state): State<AppState>,
    Form(form): Form<SearchForm>,
) -> Result<Response, AppError> {
    let term = form.termino.trim();
    if term.is_empty() {
        return Ok(Redirect::to("/").into_response());
    }

    let propiedades = Listing::search_published(&state.db, term).await?;
    Ok(Json(ResultsView {
        pagina: "Resultados de la Búsqueda".into(),
        propiedades,
    })
    .into_response())
}

async fn not_found() -> Json<NotFoundView> {
    Json(NotFoundView {
        pagina: "No Encontrada".into(),
    })
}

/// Router fallback: unknown paths land on the not-found view.
pub async fn fallback() -> Json<NotFoundView> {
    not_found().await
}
