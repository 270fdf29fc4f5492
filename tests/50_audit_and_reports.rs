mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use lexdesk_api::database::EntityStore;
use lexdesk_api::entities::catalog::{BITACORA, EVENTOS, MATERIAS_CASOS, REPORTES};

use common::{create, get, send, test_app};

#[tokio::test]
async fn audit_log_is_append_only() -> Result<()> {
    let (app, store) = test_app();
    let id = create(&app, "bitacora", json!({ "usuario_id": 1, "accion": "Inicio de sesión", "ip": "10.0.0.8" })).await?;

    let stored = store.find(&BITACORA, id).await?.unwrap();
    assert!(stored["ip"].as_str().unwrap().starts_with("enc:v1:"));
    assert!(stored["fecha"].is_string());

    let uri = format!("/api/bitacora/{}", id);
    let (status, body) = send(&app, Method::PUT, &uri, Some(json!({ "accion": "borrado" }))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], json!("FORBIDDEN"));

    let (status, _) = send(&app, Method::DELETE, &uri, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = get(&app, &uri).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["attributes"]["accion"], json!("Inicio de sesión"));
    assert_eq!(body["data"]["attributes"]["ip"], json!("10.0.0.8"));
    Ok(())
}

#[tokio::test]
async fn report_parameters_round_trip_as_json() -> Result<()> {
    let (app, store) = test_app();
    let parametros = json!({ "desde": "2025-01-01", "hasta": "2025-06-30", "abogados": [3, 7] });
    let id = create(
        &app,
        "reportes",
        json!({
            "titulo": "Casos del semestre",
            "tipo_reporte": "Casos",
            "parametros": parametros,
            "generado_por": 3
        }),
    )
    .await?;

    let stored = store.find(&REPORTES, id).await?.unwrap();
    assert!(stored["parametros"].as_str().unwrap().starts_with("enc:v1:"));

    let (status, body) = get(&app, &format!("/api/reportes/{}", id)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["attributes"]["parametros"], parametros);

    let (status, body) = common::post(
        &app,
        "/api/reportes",
        json!({ "titulo": "x", "tipo_reporte": "Casos", "parametros": 5, "generado_por": 3 }),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"].get("parametros").is_some());
    Ok(())
}

#[tokio::test]
async fn calendar_dates_are_normalized() -> Result<()> {
    let (app, _store) = test_app();
    let id = create(
        &app,
        "calendario",
        json!({
            "titulo": "Audiencia única",
            "descripcion": "Sala 4, llevar expediente",
            "fecha_inicio": "2025-03-10 09:30"
        }),
    )
    .await?;

    let (_, body) = get(&app, &format!("/api/calendario/{}", id)).await?;
    let attributes = &body["data"]["attributes"];
    assert_eq!(attributes["fecha_inicio"], json!("2025-03-10T09:30:00"));
    assert_eq!(attributes["color"], json!("#2b7bba"));
    assert_eq!(attributes["estado"], json!("Pendiente"));
    assert_eq!(attributes["descripcion"], json!("Sala 4, llevar expediente"));

    let (status, body) = common::post(&app, "/api/calendario", json!({ "titulo": "x", "fecha_inicio": "mañana" })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"].get("fecha_inicio").is_some());
    Ok(())
}

#[tokio::test]
async fn agenda_event_descriptions_are_sealed_and_searchable() -> Result<()> {
    let (app, store) = test_app();
    let id = create(
        &app,
        "eventos",
        json!({
            "titulo": "Vencimiento de plazo",
            "descripcion": "Presentar apelación ante la Sala Civil",
            "fecha_inicio": "2025-04-02 08:00",
            "tipo_evento": "Plazo",
            "creado_por": 1
        }),
    )
    .await?;

    let stored = store.find(&EVENTOS, id).await?.unwrap();
    assert!(stored["descripcion"].as_str().unwrap().starts_with("enc:v1:"));
    assert_eq!(stored["recurrente"], json!("No"));

    let (status, body) = get(&app, "/api/find/eventos?q=sala%20civil").await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["strategy"], json!("decrypt_scan"));
    assert_eq!(body["data"]["records"][0]["attributes"]["descripcion"], json!("Presentar apelación ante la Sala Civil"));

    let (status, body) = common::post(
        &app,
        "/api/eventos",
        json!({ "titulo": "x", "fecha_inicio": "2025-04-02 08:00", "recurrente": "Cada rato", "creado_por": 1 }),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"].get("recurrente").is_some());
    Ok(())
}

#[tokio::test]
async fn reference_catalogs_are_plain_crud() -> Result<()> {
    let (app, store) = test_app();
    let materia = create(&app, "materias-casos", json!({ "nombre": "Civil", "descripcion": "Materia civil" })).await?;
    let tipo = create(&app, "tipos-casos", json!({ "materia_id": materia, "nombre": "Desalojo" })).await?;
    create(&app, "etapas-procesales", json!({ "tipo_caso_id": tipo, "nombre": "Postulatoria", "orden": 1 })).await?;

    let stored = store.find(&MATERIAS_CASOS, materia).await?.unwrap();
    assert_eq!(stored["descripcion"], json!("Materia civil"));

    let (status, body) = get(&app, &format!("/api/tipos_casos?materia_id={}", materia)).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["pagination"]["total"], json!(1));
    Ok(())
}
