use std::path::Path;
use std::sync::{Arc, Mutex};

use actix_cors::Cors;
use actix_web::{get, put, web, App, HttpResponse, HttpServer, Responder};
use futures::Stream;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use ctx_gen_core::config::GenerationConfig;
use ctx_gen_core::corpus::Corpus;
use ctx_gen_core::error::GenError;
use ctx_gen_core::event::Event;
use ctx_gen_core::io::list_files;
use ctx_gen_core::model::generator::Generator;

mod config;
mod params;

use config::ServerConfig;
use params::GenerateParams;

/// Events buffered between the generation task and the HTTP response.
const EVENT_BUFFER: usize = 64;

#[derive(Deserialize)]
struct CorpusQuery {
	names: Option<String>
}

#[derive(Serialize)]
struct CorpusInfo<'a> {
	name: &'a str,
	chunks: usize,
	chars: usize,
}

/// Corpus shared by all requests. Replaced wholesale, never mutated: an
/// in-flight generation keeps reading the `Arc` it started with.
#[derive(Default)]
struct SharedData {
	corpus: Option<Arc<Corpus>>
}

/// Turns the event channel into an NDJSON body.
fn event_stream(rx: mpsc::Receiver<Event>) -> impl Stream<Item = Result<web::Bytes, serde_json::Error>> {
	futures::stream::unfold(rx, |mut rx| async move {
		let event = rx.recv().await?;
		let line = serde_json::to_vec(&event).map(|mut line| {
			line.push(b'\n');
			web::Bytes::from(line)
		});
		Some((line, rx))
	})
}

fn prepare_generation(
	corpus: Option<Arc<Corpus>>,
	defaults: &GenerationConfig,
	params: &GenerateParams,
) -> Result<Generator, GenError> {
	let config = params.config(defaults)?;
	let corpus = corpus.ok_or(GenError::EmptyCorpus)?;
	Generator::new(corpus, config)
}

fn load_corpora(data_dir: &Path, names: &[String], chunk_size: usize, max_run: usize) -> Result<Corpus, GenError> {
	let mut merged: Option<Corpus> = None;
	for name in names {
		let corpus = Corpus::load(data_dir.join(format!("{name}.txt")), chunk_size, max_run)?;
		match merged.as_mut() {
			Some(existing) => existing.merge(corpus),
			None => merged = Some(corpus),
		}
	}
	merged.ok_or(GenError::EmptyCorpus)
}

/// HTTP GET endpoint `/v1/generate`
///
/// Streams generation events as NDJSON: one `stream_token` per token, then
/// a single `stream_end`, or a single `error` in its place.
#[get("/v1/generate")]
async fn get_generated(
	data: web::Data<Mutex<SharedData>>,
	settings: web::Data<ServerConfig>,
	query: web::Query<GenerateParams>,
) -> impl Responder {
	let corpus = match data.lock() {
		Ok(shared) => shared.corpus.clone(),
		Err(_) => return HttpResponse::InternalServerError().body("Corpus lock failed"),
	};

	let (tx, rx) = mpsc::channel(EVENT_BUFFER);
	match prepare_generation(corpus, &settings.generation, &query) {
		Ok(generator) => {
			let seed = query.seed().to_owned();
			actix_web::rt::spawn(async move {
				match generator.run(&seed, tx).await {
					Ok(completion) => info!("generation for '{seed}' done: {completion:?}"),
					Err(e) => warn!("generation for '{seed}' failed: {e}"),
				}
			});
		}
		Err(e) => {
			warn!("rejected generation request: {e}");
			// Fresh channel with spare capacity: cannot be full.
			let _ = tx.try_send(Event::error(&e));
		}
	}

	HttpResponse::Ok()
		.content_type("application/x-ndjson")
		.streaming(event_stream(rx))
}

/// HTTP PUT endpoint `/v1/corpus`
///
/// Replaces the corpus with the request body and acknowledges with a `log`
/// event reporting the chunk count.
#[put("/v1/corpus")]
async fn put_corpus(data: web::Data<Mutex<SharedData>>, settings: web::Data<ServerConfig>, body: String) -> impl Responder {
	let corpus = Corpus::from_text("upload", &body, settings.chunk_size);
	let ack = corpus.acknowledgement();

	let mut shared = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Corpus lock failed"),
	};
	shared.corpus = Some(Arc::new(corpus));
	HttpResponse::Ok().json(ack)
}

/// HTTP PUT endpoint `/v1/load_corpus?names=a,b`
///
/// Loads `<data_dir>/<name>.txt` for every name and concatenates them.
#[put("/v1/load_corpus")]
async fn put_load_corpus(
	data: web::Data<Mutex<SharedData>>,
	settings: web::Data<ServerConfig>,
	query: web::Query<CorpusQuery>,
) -> impl Responder {
	let query_names = match &query.names {
		Some(s) if !s.trim().is_empty() => s.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty corpus name"),
	};

	let names: Vec<String> = query_names
		.split(',')
		.map(|s| s.trim())
		.filter(|s| !s.is_empty())
		.map(str::to_owned)
		.collect();

	let data_dir = settings.data_path();
	let chunk_size = settings.chunk_size;
	let max_run = settings.generation.corpus_max_run;
	let corpus = match web::block(move || load_corpora(&data_dir, &names, chunk_size, max_run)).await {
		Ok(Ok(corpus)) => corpus,
		Ok(Err(e)) => return HttpResponse::InternalServerError().json(Event::error(&e)),
		Err(_) => return HttpResponse::InternalServerError().body("Corpus loading task failed"),
	};
	let ack = corpus.acknowledgement();

	let mut shared = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Corpus lock failed"),
	};
	shared.corpus = Some(Arc::new(corpus));
	HttpResponse::Ok().json(ack)
}

/// HTTP GET endpoint `/v1/corpora`: corpus files available in the data directory.
#[get("/v1/corpora")]
async fn get_corpora(settings: web::Data<ServerConfig>) -> impl Responder {
	match list_files(settings.data_path(), "txt") {
		Ok(files) => HttpResponse::Ok().body(files.join("\n")),
		Err(_) => HttpResponse::InternalServerError().body("Failed to list corpora"),
	}
}

#[get("/v1/corpus")]
async fn get_corpus(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Corpus lock failed"),
	};
	match &shared.corpus {
		Some(corpus) => HttpResponse::Ok().json(CorpusInfo {
			name: corpus.name(),
			chunks: corpus.chunk_count(),
			chars: corpus.char_count(),
		}),
		None => HttpResponse::NotFound().body("No corpus loaded"),
	}
}

/// Main entry point for the server.
///
/// Reads `ServerConfig`, starts with no corpus loaded, and serves the
/// endpoints on the configured address.
#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let settings = ServerConfig::load()?;
	let address = (settings.host.clone(), settings.port);
	let payload_limit = settings.max_payload;
	info!("listening on {}:{}, data directory {}", address.0, address.1, settings.data_path().display());

	let shared_data = web::Data::new(Mutex::new(SharedData::default()));
	let settings = web::Data::new(settings);

	HttpServer::new(move || {
		App::new()
			.wrap(Cors::permissive())
			.app_data(web::PayloadConfig::new(payload_limit))
			.app_data(shared_data.clone())
			.app_data(settings.clone())
			.service(get_generated)
			.service(put_corpus)
			.service(put_load_corpus)
			.service(get_corpora)
			.service(get_corpus)
	})
		.bind(address)?
		.run()
		.await?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use actix_web::test;

	use super::*;

	const STORY: &str = "猫が走る。犬が走る。猫が鳴く。鳥が飛ぶ。猫が眠る。猫が走る。";

	fn events(body: &[u8]) -> Vec<Event> {
		std::str::from_utf8(body)
			.unwrap()
			.lines()
			.map(|line| serde_json::from_str(line).unwrap())
			.collect()
	}

	macro_rules! app {
		() => {
			test::init_service(
				App::new()
					.app_data(web::Data::new(Mutex::new(SharedData::default())))
					.app_data(web::Data::new(ServerConfig::default()))
					.service(get_generated)
					.service(put_corpus)
					.service(get_corpus),
			)
			.await
		};
	}

	#[actix_web::test]
	async fn generate_without_corpus_streams_one_error() {
		let app = app!();
		let req = test::TestRequest::get().uri("/v1/generate?seed=%E7%8C%AB").to_request();
		let body = test::call_and_read_body(&app, req).await;

		let events = events(&body);
		assert_eq!(events.len(), 1);
		assert!(matches!(events[0], Event::Error { kind: ctx_gen_core::error::ErrorKind::EmptyCorpus, .. }));
	}

	#[actix_web::test]
	async fn upload_then_generate_streams_tokens() {
		let app = app!();
		let req = test::TestRequest::put().uri("/v1/corpus").set_payload(STORY).to_request();
		let ack: Event = test::call_and_read_body_json(&app, req).await;
		assert!(matches!(ack, Event::Log { .. }));

		let req = test::TestRequest::get().uri("/v1/generate?seed=%E7%8C%AB&gen_length=20").to_request();
		let events = events(&test::call_and_read_body(&app, req).await);

		let tokens = events.iter().filter(|e| matches!(e, Event::StreamToken { .. })).count();
		assert!(tokens > 0);
		assert_eq!(events.last(), Some(&Event::StreamEnd { empty_model: false, tokens }));
	}

	#[actix_web::test]
	async fn negative_window_streams_invalid_parameter() {
		let app = app!();
		let req = test::TestRequest::put().uri("/v1/corpus").set_payload(STORY).to_request();
		test::call_service(&app, req).await;

		let req = test::TestRequest::get().uri("/v1/generate?seed=x&window=-4").to_request();
		let events = events(&test::call_and_read_body(&app, req).await);
		assert!(matches!(
			events.as_slice(),
			[Event::Error { kind: ctx_gen_core::error::ErrorKind::InvalidParameter, .. }]
		));
	}

	#[actix_web::test]
	async fn corpus_info_reflects_upload() {
		let app = app!();
		let req = test::TestRequest::get().uri("/v1/corpus").to_request();
		assert_eq!(test::call_service(&app, req).await.status(), 404);

		let req = test::TestRequest::put().uri("/v1/corpus").set_payload(STORY).to_request();
		test::call_service(&app, req).await;
		let req = test::TestRequest::get().uri("/v1/corpus").to_request();
		let info: serde_json::Value = test::call_and_read_body_json(&app, req).await;
		assert_eq!(info["chars"], STORY.chars().count());
		assert_eq!(info["chunks"], 1);
	}
}
