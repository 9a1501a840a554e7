use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post, put},
    Form, Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::{CurrentUser, OptionalUser, LOGIN_PATH},
    error::AppError,
    listings::{
        dto::{
            format_date, AddImageView, AdminView, ListingForm, ListingFormView, MessageEntry,
            MessageForm, MessagesView, PageQuery, ShowView, ToggleResponse,
        },
        lifecycle,
        repo::{self, Category, Listing, PriceRange},
    },
    state::AppState,
    storage::ext_from_mime,
};

const ADMIN_PATH: &str = "/mis-propiedades";
const PAGE_SIZE: i64 = 10;

pub fn listing_routes() -> Router<AppState> {
    Router::new()
        .route(ADMIN_PATH, get(my_listings))
        .route("/propiedades/crear", get(create_form).post(create))
        .route(
            "/propiedades/agregar-imagen/:id",
            get(add_image_form).post(store_image),
        )
        .route("/propiedades/editar/:id", get(edit_form).post(update))
        .route("/propiedades/eliminar/:id", post(delete))
        .route("/propiedades/:id", put(toggle_published))
        .route("/propiedad/:id", get(show).post(send_message))
        .route("/mensajes/:id", get(view_messages))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
}

fn admin_redirect() -> Response {
    Redirect::to(ADMIN_PATH).into_response()
}

// Offset math stays checked so an absurd page number cannot overflow.
fn page_offset(page: i64) -> Option<i64> {
    page.checked_sub(1)?.checked_mul(PAGE_SIZE)
}

#[instrument(skip(state, user))]
async fn my_listings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(q): Query<PageQuery>,
) -> Result<Response, AppError> {
    let page = q
        .pagina
        .as_deref()
        .and_then(|p| p.parse::<i64>().ok())
        .filter(|p| *p >= 1);
    let Some(page) = page else {
        return Ok(Redirect::to("/mis-propiedades?pagina=1").into_response());
    };

    let Some(offset) = page_offset(page) else {
        return Ok(Redirect::to("/mis-propiedades?pagina=1").into_response());
    };
    let listings = Listing::page_by_owner(&state.db, user.id, PAGE_SIZE, offset).await?;
    let total = Listing::count_by_owner(&state.db, user.id).await?;

    Ok(Json(AdminView {
        pagina: "Mis Propiedades".into(),
        propiedades: listings,
        paginas: (total + PAGE_SIZE - 1) / PAGE_SIZE,
        pagina_actual: page,
        total,
        limit: PAGE_SIZE,
        offset,
    })
    .into_response())
}

async fn catalogs(state: &AppState) -> Result<(Vec<Category>, Vec<PriceRange>), AppError> {
    let categories = Category::all(&state.db).await?;
    let prices = PriceRange::all(&state.db).await?;
    Ok((categories, prices))
}

#[instrument(skip(state, _user))]
async fn create_form(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<ListingFormView>, AppError> {
    let (categorias, precios) = catalogs(&state).await?;
    Ok(Json(ListingFormView {
        pagina: "Crear Propiedad".into(),
        categorias,
        precios,
        errores: Vec::new(),
        datos: None,
    }))
}

#[instrument(skip(state, user, form))]
async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<ListingForm>,
) -> Result<Response, AppError> {
    let input = match form.validate() {
        Ok(input) => input,
        Err(errores) => {
            let (categorias, precios) = catalogs(&state).await?;
            return Ok(Json(ListingFormView {
                pagina: "Crear Propiedad".into(),
                categorias,
                precios,
                errores,
                datos: Some(serde_json::to_value(&form).map_err(anyhow::Error::from)?),
            })
            .into_response());
        }
    };

    let listing = Listing::create(&state.db, user.id, &input).await?;
    info!(listing_id = %listing.id, owner = %user.id, "listing created as draft");
    Ok(Redirect::to(&format!("/propiedades/agregar-imagen/{}", listing.id)).into_response())
}

#[instrument(skip(state, user))]
async fn add_image_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let Some(listing) = Listing::find_by_id(&state.db, id).await? else {
        return Ok(admin_redirect());
    };
    if listing.published || !lifecycle::is_owner(user.id, listing.user_id) {
        return Ok(admin_redirect());
    }

    let detail = Listing::find_detail(&state.db, id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(AddImageView {
        pagina: format!("Agregar Imagen: {}", listing.title),
        propiedad: detail,
    })
    .into_response())
}

#[instrument(skip(state, user, multipart))]
async fn store_image(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let Some(mut listing) = Listing::find_by_id(&state.db, id).await? else {
        return Ok(admin_redirect());
    };
    if listing.published || !lifecycle::is_owner(user.id, listing.user_id) {
        return Ok(admin_redirect());
    }

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        if field.name() == Some("imagen") {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(e.to_string()))?;
            upload = Some((data, content_type));
        }
    }

    let Some((data, content_type)) = upload else {
        return Err(AppError::Validation("La imagen es obligatoria".into()));
    };
    let Some(ext) = ext_from_mime(&content_type) else {
        return Err(AppError::Validation(
            "El formato de imagen no es válido".into(),
        ));
    };

    let key = format!("listings/{}/{}.{}", listing.id, Uuid::new_v4(), ext);
    state
        .storage
        .put(&key, data, &content_type)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

    // Checked above, but the transition still guards itself.
    if lifecycle::attach_image(&mut listing, key).is_err() {
        return Ok(admin_redirect());
    }
    Listing::store_publication(&state.db, &listing).await?;

    info!(listing_id = %listing.id, "image stored, listing published");
    Ok(admin_redirect())
}

#[instrument(skip(state, user))]
async fn edit_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let Some(listing) = Listing::find_by_id(&state.db, id).await? else {
        return Ok(admin_redirect());
    };
    if !lifecycle::is_owner(user.id, listing.user_id) {
        return Ok(admin_redirect());
    }

    let (categorias, precios) = catalogs(&state).await?;
    Ok(Json(ListingFormView {
        pagina: format!("Editar Propiedad: {}", listing.title),
        categorias,
        precios,
        errores: Vec::new(),
        datos: Some(serde_json::to_value(&listing).map_err(anyhow::Error::from)?),
    })
    .into_response())
}

#[instrument(skip(state, user, form))]
async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Form(form): Form<ListingForm>,
) -> Result<Response, AppError> {
    let input = match form.validate() {
        Ok(input) => input,
        Err(errores) => {
            let (categorias, precios) = catalogs(&state).await?;
            return Ok(Json(ListingFormView {
                pagina: "Editar Propiedad".into(),
                categorias,
                precios,
                errores,
                datos: Some(serde_json::to_value(&form).map_err(anyhow::Error::from)?),
            })
            .into_response());
        }
    };

    let Some(listing) = Listing::find_by_id(&state.db, id).await? else {
        return Ok(admin_redirect());
    };
    if !lifecycle::is_owner(user.id, listing.user_id) {
        warn!(listing_id = %id, user_id = %user.id, "edit attempt by non-owner");
        return Ok(admin_redirect());
    }

    Listing::update_fields(&state.db, listing.id, &input).await?;
    info!(listing_id = %listing.id, "listing updated");
    Ok(admin_redirect())
}

#[instrument(skip(state, user))]
async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let Some(listing) = Listing::find_by_id(&state.db, id).await? else {
        return Ok(admin_redirect());
    };
    if !lifecycle::is_owner(user.id, listing.user_id) {
        warn!(listing_id = %id, user_id = %user.id, "delete attempt by non-owner");
        return Ok(admin_redirect());
    }

    if let Some(image) = &listing.image {
        state
            .storage
            .delete(image)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
    }
    Listing::delete(&state.db, listing.id).await?;

    info!(listing_id = %listing.id, "listing deleted");
    Ok(admin_redirect())
}

#[instrument(skip(state, user))]
async fn toggle_published(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let Some(mut listing) = Listing::find_by_id(&state.db, id).await? else {
        return Ok(admin_redirect());
    };
    if !lifecycle::is_owner(user.id, listing.user_id) {
        return Ok(admin_redirect());
    }

    lifecycle::toggle_published(&mut listing);
    Listing::store_publication(&state.db, &listing).await?;

    info!(listing_id = %listing.id, published = listing.published, "publication toggled");
    Ok(Json(ToggleResponse { resultado: "ok" }).into_response())
}

#[instrument(skip(state, user))]
async fn show(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let Some(detail) = Listing::find_detail(&state.db, id).await? else {
        return Ok(Redirect::to("/404").into_response());
    };
    if !detail.published {
        return Ok(Redirect::to("/404").into_response());
    }

    let es_vendedor = user
        .as_ref()
        .map(|u| lifecycle::is_owner(u.id, detail.user_id))
        .unwrap_or(false);

    Ok(Json(ShowView {
        pagina: detail.title.clone(),
        propiedad: detail,
        usuario: user,
        es_vendedor,
        errores: Vec::new(),
    })
    .into_response())
}

#[instrument(skip(state, user, form))]
async fn send_message(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Path(id): Path<Uuid>,
    Form(form): Form<MessageForm>,
) -> Result<Response, AppError> {
    let Some(detail) = Listing::find_detail(&state.db, id).await? else {
        return Ok(Redirect::to("/404").into_response());
    };

    let errors = form.validate();
    if !errors.is_empty() {
        let es_vendedor = user
            .as_ref()
            .map(|u| lifecycle::is_owner(u.id, detail.user_id))
            .unwrap_or(false);
        return Ok(Json(ShowView {
            pagina: detail.title.clone(),
            propiedad: detail,
            usuario: user,
            es_vendedor,
            errores: errors,
        })
        .into_response());
    }

    // Inquiries need a sender identity.
    let Some(sender) = user else {
        return Ok(Redirect::to(LOGIN_PATH).into_response());
    };

    repo::create_message(&state.db, detail.id, sender.id, form.mensaje.trim()).await?;
    info!(listing_id = %detail.id, sender = %sender.id, "inquiry message stored");
    Ok(Redirect::to("/").into_response())
}

#[instrument(skip(state, user))]
async fn view_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let Some(listing) = Listing::find_by_id(&state.db, id).await? else {
        return Ok(admin_redirect());
    };
    if !lifecycle::is_owner(user.id, listing.user_id) {
        return Ok(admin_redirect());
    }

    let messages = repo::messages_for_listing(&state.db, listing.id).await?;
    Ok(Json(MessagesView {
        pagina: "Mensajes".into(),
        mensajes: messages
            .into_iter()
            .map(|m| MessageEntry {
                mensaje: m.body,
                usuario: m.sender_name,
                fecha: format_date(m.created_at),
            })
            .collect(),
    })
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::SessionKeys;
    use crate::auth::repo::User;
    use crate::auth::tokens;
    use crate::listings::repo::ListingInput;
    use axum::body::Body;
    use axum::extract::FromRef;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> Router {
        listing_routes().with_state(AppState::fake())
    }

    #[test]
    fn page_offset_is_checked_against_overflow() {
        assert_eq!(page_offset(1), Some(0));
        assert_eq!(page_offset(3), Some(2 * PAGE_SIZE));
        assert_eq!(page_offset(i64::MAX), None);
    }

    #[tokio::test]
    async fn every_mutation_route_is_guarded() {
        let id = Uuid::new_v4();
        let cases = [
            ("GET", "/mis-propiedades".to_string()),
            ("GET", "/propiedades/crear".to_string()),
            ("POST", "/propiedades/crear".to_string()),
            ("GET", format!("/propiedades/agregar-imagen/{id}")),
            ("POST", format!("/propiedades/agregar-imagen/{id}")),
            ("GET", format!("/propiedades/editar/{id}")),
            ("POST", format!("/propiedades/editar/{id}")),
            ("POST", format!("/propiedades/eliminar/{id}")),
            ("PUT", format!("/propiedades/{id}")),
            ("GET", format!("/mensajes/{id}")),
        ];

        for (method, uri) in cases {
            let res = app()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(&uri)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(
                res.status(),
                StatusCode::SEE_OTHER,
                "{method} {uri} should redirect anonymously"
            );
            assert_eq!(res.headers()["location"], LOGIN_PATH, "{method} {uri}");
        }
    }

    async fn seed_user(db: &sqlx::PgPool, name: &str, email: &str) -> User {
        User::create(
            db,
            name,
            email,
            "not-a-real-hash",
            &tokens::new_token(),
            tokens::confirmation_deadline(),
        )
        .await
        .unwrap()
    }

    fn seed_input() -> ListingInput {
        ListingInput {
            title: "Casa centro".into(),
            description: "Casa con patio".into(),
            category_id: 1,
            price_id: 1,
            rooms: 2,
            parking: 1,
            bathrooms: 1,
            street: None,
            lat: "20.676".into(),
            lng: "-103.39".into(),
        }
    }

    #[sqlx::test]
    async fn non_owner_mutations_redirect_and_change_nothing(db: sqlx::PgPool) {
        let owner = seed_user(&db, "Ana", "ana@example.com").await;
        let intruder = seed_user(&db, "Beto", "beto@example.com").await;
        let listing = Listing::create(&db, owner.id, &seed_input()).await.unwrap();

        let state = AppState::fake_with_db(db.clone());
        let session = SessionKeys::from_ref(&state)
            .sign(intruder.id, &intruder.name)
            .unwrap();
        let app = listing_routes().with_state(state);

        let edit_body = "titulo=Otra&descripcion=Otra+descripcion&categoria=1&precio=1\
                         &habitaciones=3&estacionamiento=1&wc=1&lat=1.0&lng=2.0";
        let cases = [
            ("PUT", format!("/propiedades/{}", listing.id), None),
            (
                "POST",
                format!("/propiedades/editar/{}", listing.id),
                Some(edit_body),
            ),
            ("POST", format!("/propiedades/eliminar/{}", listing.id), None),
        ];

        for (method, uri, form) in cases {
            let mut req = Request::builder()
                .method(method)
                .uri(&uri)
                .header("cookie", format!("_token={session}"));
            if form.is_some() {
                req = req.header("content-type", "application/x-www-form-urlencoded");
            }
            let res = app
                .clone()
                .oneshot(req.body(form.map_or(Body::empty(), Body::from)).unwrap())
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::SEE_OTHER, "{method} {uri}");
            assert_eq!(res.headers()["location"], ADMIN_PATH, "{method} {uri}");
        }

        let found = Listing::find_by_id(&db, listing.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Casa centro");
        assert!(!found.published);
    }
}
