use axum::{
    extract::{FromRef, Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            ForgotPasswordForm, FormError, FormView, LoginForm, MessageView, NewPasswordForm,
            RegisterForm, RegisterPrefill, RegisterView, TokenOutcomeView,
        },
        extractors::{removal_cookie, session_cookie, LOGIN_PATH},
        jwt::SessionKeys,
        password::{hash_password, verify_password},
        repo::User,
        tokens,
    },
    error::AppError,
    mailer::{confirmation_email, password_reset_email},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login_form).post(authenticate))
        .route("/auth/cerrar-sesion", post(logout))
        .route("/auth/registro", get(register_form).post(register))
        .route("/auth/confirmar/:token", get(confirm))
        .route(
            "/auth/olvide-password",
            get(forgot_password_form).post(forgot_password),
        )
        .route(
            "/auth/olvide-password/:token",
            get(verify_reset_token).post(new_password),
        )
}

async fn login_form() -> Json<FormView> {
    Json(FormView::new("Iniciar Sesión"))
}

fn login_error(msg: &str) -> Response {
    Json(FormView::with_errors(
        "Iniciar Sesión",
        vec![FormError::new(msg)],
    ))
    .into_response()
}

#[instrument(skip(state, jar, form))]
async fn authenticate(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(Json(FormView::with_errors("Iniciar Sesión", errors)).into_response());
    }

    let email = form.email.trim().to_lowercase();
    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!(email = %email, "login for unknown account");
        return Ok(login_error("La cuenta no está registrada"));
    };

    // Invariant: an unconfirmed user cannot authenticate.
    if !user.confirmed {
        warn!(user_id = %user.id, "login for unconfirmed account");
        return Ok(login_error(
            "La cuenta no está confirmada, revisa tu correo",
        ));
    }

    if !verify_password(&form.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with wrong password");
        return Ok(login_error("El password es incorrecto"));
    }

    let keys = SessionKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.name)?;

    info!(user_id = %user.id, "user logged in");
    Ok((
        jar.add(session_cookie(token)),
        Redirect::to("/mis-propiedades"),
    )
        .into_response())
}

async fn logout(jar: CookieJar) -> Response {
    (jar.add(removal_cookie()), Redirect::to(LOGIN_PATH)).into_response()
}

async fn register_form() -> Json<RegisterView> {
    Json(RegisterView {
        pagina: "Crear Cuenta".into(),
        errores: Vec::new(),
        usuario: None,
    })
}

fn register_rerender(form: &RegisterForm, errores: Vec<FormError>) -> Response {
    Json(RegisterView {
        pagina: "Crear Cuenta".into(),
        errores,
        usuario: Some(RegisterPrefill {
            nombre: form.nombre.clone(),
            email: form.email.clone(),
        }),
    })
    .into_response()
}

#[instrument(skip(state, form))]
async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(register_rerender(&form, errors));
    }

    let email = form.email.trim().to_lowercase();
    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %email, "duplicate registration attempt");
        return Ok(register_rerender(
            &form,
            vec![FormError::new("El usuario ya existe")],
        ));
    }

    let hash = hash_password(&form.password)?;
    let token = tokens::new_token();
    let user = User::create(
        &state.db,
        form.nombre.trim(),
        &email,
        &hash,
        &token,
        tokens::confirmation_deadline(),
    )
    .await?;

    let config = &state.config;
    state
        .mailer
        .send(confirmation_email(
            &config.mail.from,
            &config.base_url,
            &user.name,
            &user.email,
            &token,
        ))
        .await
        .map_err(|e| AppError::Mail(e.to_string()))?;

    info!(user_id = %user.id, "user registered, confirmation email sent");
    Ok(Json(MessageView {
        pagina: "Cuenta Creada Correctamente".into(),
        mensaje: "Hemos enviado un email de confirmación, haz click en el enlace".into(),
    })
    .into_response())
}

fn invalid_token_view(pagina: &str) -> Json<TokenOutcomeView> {
    Json(TokenOutcomeView {
        pagina: pagina.into(),
        mensaje: "El token no es válido".into(),
        error: true,
    })
}

#[instrument(skip(state))]
async fn confirm(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<TokenOutcomeView>, AppError> {
    let Some(user) = User::find_by_token(&state.db, &token).await? else {
        return Ok(invalid_token_view("Hubo un error al confirmar tu cuenta"));
    };

    User::confirm(&state.db, user.id).await?;
    info!(user_id = %user.id, "account confirmed");
    Ok(Json(TokenOutcomeView {
        pagina: "Cuenta Confirmada".into(),
        mensaje: "La cuenta se confirmó correctamente".into(),
        error: false,
    }))
}

async fn forgot_password_form() -> Json<FormView> {
    Json(FormView::new("Recupera tu Password"))
}

#[instrument(skip(state, form))]
async fn forgot_password(
    State(state): State<AppState>,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Response, AppError> {
    let email = form.email.trim().to_lowercase();
    if !crate::auth::dto::is_valid_email(&email) {
        return Ok(Json(FormView::with_errors(
            "Recupera tu Password",
            vec![FormError::new("El email es obligatorio")],
        ))
        .into_response());
    }

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        return Ok(Json(FormView::with_errors(
            "Recupera tu Password",
            vec![FormError::new("El usuario no existe")],
        ))
        .into_response());
    };

    let token = tokens::new_token();
    User::set_token(&state.db, user.id, &token, tokens::reset_deadline()).await?;

    let config = &state.config;
    state
        .mailer
        .send(password_reset_email(
            &config.mail.from,
            &config.base_url,
            &user.name,
            &user.email,
            &token,
        ))
        .await
        .map_err(|e| AppError::Mail(e.to_string()))?;

    info!(user_id = %user.id, "password reset email sent");
    Ok(Json(MessageView {
        pagina: "Restablece tu Password".into(),
        mensaje: "Hemos enviado un email con las instrucciones".into(),
    })
    .into_response())
}

#[instrument(skip(state))]
async fn verify_reset_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    if User::find_by_token(&state.db, &token).await?.is_none() {
        return Ok(invalid_token_view("Hubo un error").into_response());
    }
    Ok(Json(FormView::new("Crear Password")).into_response())
}

#[instrument(skip(state, form))]
async fn new_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Form(form): Form<NewPasswordForm>,
) -> Result<Response, AppError> {
    if form.password.len() < 6 {
        return Ok(Json(FormView::with_errors(
            "Crear Password",
            vec![FormError::new(
                "El password debe de ser mínimo de 6 caracteres",
            )],
        ))
        .into_response());
    }

    let Some(user) = User::find_by_token(&state.db, &token).await? else {
        return Ok(invalid_token_view("Hubo un error").into_response());
    };

    let hash = hash_password(&form.password)?;
    User::update_password(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password reset completed");
    Ok(Json(TokenOutcomeView {
        pagina: "Password Restablecido".into(),
        mensaje: "El password se cambió correctamente".into(),
        error: false,
    })
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> Router {
        auth_routes().with_state(AppState::fake())
    }

    #[tokio::test]
    async fn login_form_renders() {
        let res = app()
            .oneshot(
                Request::builder()
                    .uri("/auth/login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let view: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(view["pagina"], "Iniciar Sesión");
        assert!(view["errores"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_login_input_rerenders_with_errors() {
        let res = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/login")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from("email=nope&password="))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let view: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(view["errores"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalid_register_input_rerenders_with_prefill() {
        let res = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/registro")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from(
                        "nombre=Ana&email=ana%40example.com&password=abc&repetir_password=abc",
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let view: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(view["usuario"]["nombre"], "Ana");
        assert_eq!(view["errores"][0]["msg"], "El password debe de ser mínimo de 6 caracteres");
    }

    async fn register_ana(app: &Router) -> serde_json::Value {
        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/registro")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from(
                        "nombre=Ana&email=ana%40example.com&password=secret1&repetir_password=secret1",
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[sqlx::test]
    async fn duplicate_email_registration_creates_no_second_account(db: sqlx::PgPool) {
        let app = auth_routes().with_state(AppState::fake_with_db(db.clone()));

        let first = register_ana(&app).await;
        assert_eq!(first["pagina"], "Cuenta Creada Correctamente");

        let second = register_ana(&app).await;
        assert_eq!(second["errores"][0]["msg"], "El usuario ya existe");
        assert_eq!(second["usuario"]["email"], "ana@example.com");

        let (count,): (i64,) =
            sqlx::query_as("SELECT count(*) FROM users WHERE email = 'ana@example.com'")
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    async fn consumed_confirmation_token_cannot_be_reused(db: sqlx::PgPool) {
        let app = auth_routes().with_state(AppState::fake_with_db(db.clone()));
        register_ana(&app).await;

        let (token,): (String,) =
            sqlx::query_as("SELECT token FROM users WHERE email = 'ana@example.com'")
                .fetch_one(&db)
                .await
                .unwrap();

        let confirm = |token: String| {
            let app = app.clone();
            async move {
                let res = app
                    .oneshot(
                        Request::builder()
                            .uri(format!("/auth/confirmar/{token}"))
                            .body(Body::empty())
                            .unwrap(),
                    )
                    .await
                    .unwrap();
                let body = res.into_body().collect().await.unwrap().to_bytes();
                serde_json::from_slice::<serde_json::Value>(&body).unwrap()
            }
        };

        let first = confirm(token.clone()).await;
        assert_eq!(first["error"], false);
        assert_eq!(first["pagina"], "Cuenta Confirmada");

        let (confirmed, stored): (bool, Option<String>) = sqlx::query_as(
            "SELECT confirmed, token FROM users WHERE email = 'ana@example.com'",
        )
        .fetch_one(&db)
        .await
        .unwrap();
        assert!(confirmed);
        assert_eq!(stored, None);

        // Second use of the same token is indistinguishable from a bad token.
        let second = confirm(token).await;
        assert_eq!(second["error"], true);
        assert_eq!(second["mensaje"], "El token no es válido");
    }

    #[tokio::test]
    async fn logout_clears_cookie_and_redirects() {
        let res = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/cerrar-sesion")
                    .header("cookie", "_token=whatever")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()["location"], LOGIN_PATH);
        let set_cookie = res.headers()["set-cookie"].to_str().unwrap();
        assert!(set_cookie.contains("Max-Age=0"));
    }
}
