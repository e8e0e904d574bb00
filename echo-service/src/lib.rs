//! # Echo Service
//!
//! **INTERNAL USE ONLY**: This crate exists solely to provide an HTTP server and the matching
//! service description for integration testing `dynrest-core` and the `dynrest` CLI.
//! It is not intended for production use.
//!
//! The server exposes a small in-memory pets API plus a few endpoints that echo back what
//! they received:
//!
//! | Route | Behaviour |
//! |---|---|
//! | `GET /pets?limit&tag` | Lists pets |
//! | `POST /pets` | Creates a pet from a JSON body, `201 Created` |
//! | `GET /pets/{id}` | One pet, `404` when unknown |
//! | `DELETE /pets/{id}` | `204 No Content`, `404` when unknown |
//! | `GET /greeting/{name}` | `text/plain` greeting |
//! | `GET /echo/headers` | The request headers as a JSON object |
//! | `POST /echo/form` | The form fields of the body as a JSON list of pairs |
//! | `GET /slow?ms` | Answers after sleeping `ms` milliseconds |
use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::{collections::BTreeMap, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::Mutex};

/// Service description of the routes served by [`router`].
pub const PETS_DESCRIPTION: &str = include_str!("../descriptions/pets.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewPet {
    name: String,
    tag: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
    tag: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlowParams {
    ms: u64,
}

#[derive(Default)]
struct Pets {
    by_id: BTreeMap<u64, Pet>,
    next_id: u64,
}

impl Pets {
    fn insert(&mut self, name: &str, tag: Option<&str>) -> Pet {
        self.next_id += 1;
        let pet = Pet {
            id: self.next_id,
            name: name.to_string(),
            tag: tag.map(str::to_string),
        };
        self.by_id.insert(pet.id, pet.clone());
        pet
    }
}

type Store = Arc<Mutex<Pets>>;

/// The echo router, seeded with `rex` (id 1, dog) and `tom` (id 2, cat).
pub fn router() -> Router {
    let mut pets = Pets::default();
    pets.insert("rex", Some("dog"));
    pets.insert("tom", Some("cat"));

    Router::new()
        .route("/pets", get(list_pets).post(create_pet))
        .route("/pets/{id}", get(get_pet).delete(delete_pet))
        .route("/greeting/{name}", get(greet))
        .route("/echo/headers", get(echo_headers))
        .route("/echo/form", post(echo_form))
        .route("/slow", get(slow))
        .with_state(Arc::new(Mutex::new(pets)))
}

/// Serves a fresh [`router`] on an ephemeral local port and returns its address.
pub async fn spawn() -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        let _ = axum::serve(listener, router()).await;
    });

    Ok(addr)
}

async fn list_pets(State(store): State<Store>, Query(params): Query<ListParams>) -> Json<Vec<Pet>> {
    let pets = store.lock().await;
    let matching = pets
        .by_id
        .values()
        .filter(|pet| params.tag.is_none() || pet.tag == params.tag)
        .take(params.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();
    Json(matching)
}

async fn get_pet(State(store): State<Store>, Path(id): Path<u64>) -> Result<Json<Pet>, StatusCode> {
    let pets = store.lock().await;
    pets.by_id
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn create_pet(
    State(store): State<Store>,
    Json(new): Json<NewPet>,
) -> (StatusCode, Json<Pet>) {
    let mut pets = store.lock().await;
    let pet = pets.insert(&new.name, new.tag.as_deref());
    (StatusCode::CREATED, Json(pet))
}

async fn delete_pet(State(store): State<Store>, Path(id): Path<u64>) -> StatusCode {
    let mut pets = store.lock().await;
    match pets.by_id.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn greet(Path(name): Path<String>) -> String {
    format!("Hello, {name}")
}

async fn echo_headers(headers: HeaderMap) -> Json<Value> {
    let mut echoed = Map::new();
    for name in headers.keys() {
        let values: Vec<Value> = headers
            .get_all(name)
            .iter()
            .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let value = match <[Value; 1]>::try_from(values) {
            Ok([single]) => single,
            Err(many) => Value::Array(many),
        };
        echoed.insert(name.to_string(), value);
    }
    Json(Value::Object(echoed))
}

async fn echo_form(Form(fields): Form<Vec<(String, String)>>) -> Json<Vec<(String, String)>> {
    Json(fields)
}

async fn slow(Query(params): Query<SlowParams>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(params.ms)).await;
    Json(json!({ "slept_ms": params.ms }))
}
