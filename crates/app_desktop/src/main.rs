use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{fs, mem};

use anyhow::{Context as _, Result};
use api_http::HttpGateway;
use config::{API_URL_ENV, ClientConfig, ConfigStore};
use core_client::format::{
    FileKind, excerpt_preview, format_file_size, format_latency, format_message_time,
    format_upload_date,
};
use core_client::{
    ChatLog, CollectionSnapshot, ConnectionSnapshot, QueryOptions, Shell, Tab, UploadState,
    UploadStatus,
};
use core_types::{Document, KnowledgeApi, Message, MessageKind};
use gpui::{
    App, Application, Bounds, Context, ExternalPaths, KeyDownEvent, MouseButton,
    PathPromptOptions, PromptLevel, Window, WindowBounds, WindowOptions, div, prelude::*, px,
    rgb, size,
};
use i18n::I18n;
use tokio::runtime::Runtime;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

struct DocentApp {
    shell: Shell,
    runtime: Arc<Runtime>,
    i18n: I18n,
    draft: String,
    upload_notice: Option<String>,
}

impl DocentApp {
    fn new(shell: Shell, runtime: Arc<Runtime>, i18n: I18n, cx: &mut Context<Self>) -> Self {
        runtime.spawn(shell.mount());
        Self::watch_components(&shell, cx);
        Self {
            shell,
            runtime,
            i18n,
            draft: String::new(),
            upload_notice: None,
        }
    }

    // Components publish through watch channels; any change re-renders the window.
    fn watch_components(shell: &Shell, cx: &mut Context<Self>) {
        let mut connection = shell.connection().subscribe();
        let mut chat = shell.chat().subscribe();
        let mut documents = shell.documents().subscribe();
        let mut upload = shell.upload().subscribe();
        cx.spawn(async move |this, cx| {
            loop {
                let changed = tokio::select! {
                    biased;
                    changed = connection.changed() => changed,
                    changed = chat.changed() => changed,
                    changed = documents.changed() => changed,
                    changed = upload.changed() => changed,
                };
                if changed.is_err() || this.update(cx, |_, cx| cx.notify()).is_err() {
                    break;
                }
            }
        })
        .detach();
    }

    fn select_tab(&mut self, tab: Tab, cx: &mut Context<Self>) {
        if self.shell.select_tab(tab) {
            cx.notify();
        }
    }

    fn retry_connection(&mut self) {
        self.runtime.spawn(self.shell.retry_connection());
    }

    fn handle_key(&mut self, event: &KeyDownEvent) -> bool {
        if self.shell.active_tab() != Tab::Chat {
            return false;
        }
        let keystroke = &event.keystroke;
        match keystroke.key.as_str() {
            "enter" => self.submit_draft(),
            "backspace" => self.draft.pop().is_some(),
            _ if keystroke.modifiers.control || keystroke.modifiers.platform => false,
            _ => match keystroke.key_char.as_deref() {
                Some(text) => {
                    self.draft.push_str(text);
                    true
                }
                None => false,
            },
        }
    }

    fn submit_draft(&mut self) -> bool {
        if self.draft.trim().is_empty() || self.shell.chat().snapshot().is_awaiting() {
            return false;
        }
        let text = mem::take(&mut self.draft);
        let chat = Arc::clone(self.shell.chat());
        self.runtime.spawn(async move {
            chat.submit(&text).await;
        });
        true
    }

    fn clear_chat(&mut self) {
        self.shell.chat().clear();
    }

    fn refresh_documents(&mut self) {
        let documents = Arc::clone(self.shell.documents());
        self.runtime.spawn(async move {
            documents.refresh().await;
        });
    }

    // The native picker takes no extension filter, so unlisted types are flagged here
    // and still sent.
    fn upload_path(&mut self, path: PathBuf, cx: &mut Context<Self>) {
        self.upload_notice = (!core_client::upload::matches_picker_filter(&path)).then(|| {
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.i18n
                .format("upload.unlisted_type", &[("filename", filename.as_str())])
        });
        cx.notify();
        let upload = Arc::clone(self.shell.upload());
        self.runtime.spawn(async move {
            // Failures land in the upload status and the log.
            let _ = upload.upload_path(path).await;
        });
    }

    fn pick_file(&mut self, cx: &mut Context<Self>) {
        let picked = cx.prompt_for_paths(PathPromptOptions {
            files: true,
            directories: false,
            multiple: false,
            prompt: None,
        });
        cx.spawn(async move |this, cx| match picked.await {
            Ok(Ok(Some(paths))) => {
                if let Some(path) = paths.into_iter().next() {
                    let _ = this.update(cx, |this, cx| this.upload_path(path, cx));
                }
            }
            Ok(Ok(None)) | Err(_) => {}
            Ok(Err(err)) => warn!(error = %err, "file picker failed"),
        })
        .detach();
    }

    fn confirm_delete(
        &mut self,
        document: &Document,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        let documents = Arc::clone(self.shell.documents());
        let confirmation = documents.request_delete(document);
        let question = self.i18n.format(
            "documents.delete.confirm",
            &[("filename", confirmation.filename())],
        );
        let answer = window.prompt(
            PromptLevel::Warning,
            &question,
            None,
            &[
                self.i18n.t("documents.delete.confirm_yes"),
                self.i18n.t("documents.delete.confirm_no"),
            ],
            cx,
        );
        let failed = self.i18n.t("documents.delete.failed").to_string();
        let dismiss = self.i18n.t("documents.delete.confirm_no").to_string();
        let runtime = Arc::clone(&self.runtime);
        cx.spawn_in(window, async move |_this, cx| {
            if answer.await != Ok(0) {
                return;
            }
            let outcome = runtime
                .spawn(async move { documents.delete_document(confirmation).await })
                .await;
            let detail = match outcome {
                Ok(Ok(_)) => return,
                Ok(Err(err)) => err.user_message(),
                Err(err) => err.to_string(),
            };
            let _ = cx.update(|window, cx| {
                let _ = window.prompt(
                    PromptLevel::Critical,
                    &failed,
                    Some(&detail),
                    &[dismiss.as_str()],
                    cx,
                );
            });
        })
        .detach();
    }
}

impl Render for DocentApp {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let connection = self.shell.connection().snapshot();
        let active = self.shell.active_tab();

        let nav = div().flex().gap_2().children(Tab::ALL.into_iter().map(|tab| {
            nav_item(self.i18n.t(tab.label_key()), tab == active).on_mouse_down(
                MouseButton::Left,
                cx.listener(move |this, _event, _window, cx| this.select_tab(tab, cx)),
            )
        }));

        let content = match active {
            Tab::Chat => self.render_chat(cx).into_any_element(),
            Tab::Documents => self.render_documents(cx).into_any_element(),
        };

        div()
            .bg(rgb(0x121212))
            .text_color(rgb(0xeeeeee))
            .size_full()
            .flex()
            .flex_col()
            .p_4()
            .gap_3()
            .tab_index(0)
            .on_key_down(cx.listener(|this, event: &KeyDownEvent, _window, cx| {
                if this.handle_key(event) {
                    cx.notify();
                }
            }))
            .child(div().text_xl().child(self.i18n.t("app.title").to_string()))
            .child(nav)
            .children(self.render_banner(&connection, cx))
            .child(content)
            .child(self.render_status(&connection))
    }
}

impl DocentApp {
    fn render_banner(
        &self,
        connection: &ConnectionSnapshot,
        cx: &mut Context<Self>,
    ) -> Option<impl IntoElement> {
        let state = connection.status.connectivity();
        if state.connected {
            return None;
        }
        let error = state.last_error.unwrap_or_default();
        Some(
            div()
                .flex()
                .justify_between()
                .items_center()
                .bg(rgb(0x5c1d1d))
                .rounded_md()
                .px_3()
                .py_2()
                .child(
                    self.i18n
                        .format("connection.banner", &[("error", error.as_str())]),
                )
                .when(connection.status.can_retry(), |banner| {
                    banner.child(
                        button(self.i18n.t("connection.retry")).on_mouse_down(
                            MouseButton::Left,
                            cx.listener(|this, _event, _window, _cx| this.retry_connection()),
                        ),
                    )
                }),
        )
    }

    fn render_status(&self, connection: &ConnectionSnapshot) -> impl IntoElement {
        let state = connection.status.connectivity();
        let mut text = if state.connected {
            self.i18n.t("status.connected").to_string()
        } else {
            self.i18n.t("status.disconnected").to_string()
        };
        if let Some(version) = &connection.backend_version {
            text.push_str(" • ");
            text.push_str(
                &self
                    .i18n
                    .format("status.backend_version", &[("version", version.version.as_str())]),
            );
        }
        div().text_sm().text_color(rgb(0x9a9a9a)).child(text)
    }

    fn render_chat(&self, cx: &mut Context<Self>) -> impl IntoElement {
        let log: ChatLog = self.shell.chat().snapshot();

        let body = if log.messages.is_empty() {
            div()
                .flex()
                .flex_col()
                .gap_1()
                .child(div().text_lg().child(self.i18n.t("chat.welcome.title").to_string()))
                .child(
                    div()
                        .text_color(rgb(0x9a9a9a))
                        .child(self.i18n.t("chat.welcome.body").to_string()),
                )
                .into_any_element()
        } else {
            div()
                .flex()
                .flex_col()
                .gap_2()
                .children(log.messages.iter().map(|message| self.render_message(message)))
                .into_any_element()
        };

        let draft = if self.draft.is_empty() {
            div()
                .text_color(rgb(0x6a6a6a))
                .child(self.i18n.t("chat.placeholder").to_string())
        } else {
            div().child(self.draft.clone())
        };

        div()
            .flex()
            .flex_col()
            .flex_1()
            .gap_3()
            .child(
                div()
                    .id("chat-log")
                    .flex_1()
                    .overflow_y_scroll()
                    .child(body)
                    .when(log.is_awaiting(), |log_view| {
                        log_view.child(
                            div()
                                .text_color(rgb(0x9a9a9a))
                                .child(self.i18n.t("chat.thinking").to_string()),
                        )
                    }),
            )
            .child(
                div()
                    .flex()
                    .gap_2()
                    .child(
                        div()
                            .flex_1()
                            .bg(rgb(0x2d2d2d))
                            .rounded_md()
                            .px_3()
                            .py_2()
                            .child(draft),
                    )
                    .child(button(self.i18n.t("chat.send")).on_mouse_down(
                        MouseButton::Left,
                        cx.listener(|this, _event, _window, cx| {
                            if this.submit_draft() {
                                cx.notify();
                            }
                        }),
                    ))
                    .child(button(self.i18n.t("chat.clear")).on_mouse_down(
                        MouseButton::Left,
                        cx.listener(|this, _event, _window, _cx| this.clear_chat()),
                    )),
            )
    }

    fn render_message(&self, message: &Message) -> impl IntoElement {
        let background = match message.kind {
            MessageKind::User => rgb(0x3355aa),
            MessageKind::Assistant => rgb(0x2d2d2d),
            MessageKind::Error => rgb(0x5c1d1d),
        };

        div()
            .flex()
            .flex_col()
            .gap_1()
            .bg(background)
            .rounded_md()
            .px_3()
            .py_2()
            .child(message.text.clone())
            .when(!message.sources.is_empty(), |bubble| {
                bubble
                    .child(
                        div()
                            .text_sm()
                            .text_color(rgb(0xbbbbbb))
                            .child(self.i18n.t("chat.sources").to_string()),
                    )
                    .children(message.sources.iter().map(|source| {
                        div()
                            .text_xs()
                            .bg(rgb(0x1e1e1e))
                            .rounded_md()
                            .p_2()
                            .child(source.metadata.filename.clone())
                            .child(excerpt_preview(&source.excerpt))
                    }))
            })
            .when_some(message.latency_seconds, |bubble, latency| {
                let latency = format_latency(latency);
                bubble.child(div().text_xs().text_color(rgb(0x9a9a9a)).child(
                    self.i18n
                        .format("chat.processing_time", &[("latency", latency.as_str())]),
                ))
            })
            .child(
                div()
                    .text_xs()
                    .text_color(rgb(0x9a9a9a))
                    .child(format_message_time(&message.created_at)),
            )
    }

    fn render_documents(&self, cx: &mut Context<Self>) -> impl IntoElement {
        let collection: CollectionSnapshot = self.shell.documents().snapshot();
        let upload: UploadStatus = self.shell.upload().status();

        let refresh_label = if collection.is_loading() {
            self.i18n.t("documents.loading")
        } else {
            self.i18n.t("documents.refresh")
        };
        let header = div()
            .flex()
            .justify_between()
            .items_center()
            .child(div().text_lg().child(self.i18n.t("documents.title").to_string()))
            .child(button(refresh_label).on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, _event, _window, _cx| this.refresh_documents()),
            ));

        let stats = collection.stats.as_ref().map(|stats| {
            let types = stats
                .document_types
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            div()
                .flex()
                .gap_3()
                .child(stat_card(
                    self.i18n.t("documents.stats.documents"),
                    stats.total_documents.to_string(),
                ))
                .child(stat_card(
                    self.i18n.t("documents.stats.chunks"),
                    stats.total_chunks.to_string(),
                ))
                .child(stat_card(self.i18n.t("documents.stats.types"), types))
        });

        let drop_zone = div()
            .id("upload-zone")
            .flex()
            .flex_col()
            .items_center()
            .gap_1()
            .p_4()
            .border_2()
            .border_color(rgb(0x4a4a4a))
            .rounded_md()
            .on_drop(cx.listener(|this, paths: &ExternalPaths, _window, cx| {
                if let Some(path) = paths.paths().first() {
                    this.upload_path(path.clone(), cx);
                }
            }))
            .child(match &upload.state {
                UploadState::Uploading { filename } => div().child(format!(
                    "{} {filename}",
                    self.i18n.t("upload.uploading")
                )),
                UploadState::Idle => div()
                    .flex()
                    .flex_col()
                    .items_center()
                    .child(self.i18n.t("upload.hint").to_string())
                    .child(button(self.i18n.t("upload.browse")).on_mouse_down(
                        MouseButton::Left,
                        cx.listener(|this, _event, _window, cx| this.pick_file(cx)),
                    ))
                    .child(
                        div()
                            .text_sm()
                            .text_color(rgb(0x9a9a9a))
                            .child(self.i18n.t("upload.supported").to_string()),
                    ),
            })
            .when_some(self.upload_notice.clone(), |zone, notice| {
                zone.child(div().text_sm().text_color(rgb(0xe0b050)).child(notice))
            })
            .when_some(upload.last_error.clone(), |zone, error| {
                zone.child(
                    div()
                        .text_sm()
                        .text_color(rgb(0xff6b6b))
                        .child(self.i18n.format("upload.failed", &[("error", error.as_str())])),
                )
            });

        let list = if collection.documents.is_empty() {
            div()
                .text_color(rgb(0x9a9a9a))
                .child(self.i18n.t("documents.empty").to_string())
                .into_any_element()
        } else {
            div()
                .flex()
                .flex_col()
                .gap_2()
                .children(
                    collection
                        .documents
                        .iter()
                        .map(|document| self.render_document_row(document, cx)),
                )
                .into_any_element()
        };

        div()
            .flex()
            .flex_col()
            .flex_1()
            .gap_3()
            .child(header)
            .children(stats)
            .child(drop_zone)
            .child(div().id("document-list").flex_1().overflow_y_scroll().child(list))
    }

    fn render_document_row(
        &self,
        document: &Document,
        cx: &mut Context<Self>,
    ) -> impl IntoElement + use<> {
        let icon_color = match FileKind::from_file_type(&document.file_type) {
            FileKind::Pdf => rgb(0xef4444),
            FileKind::Word => rgb(0x3b82f6),
            FileKind::Other => rgb(0x9a9a9a),
        };
        let chunks = document.chunk_count.to_string();
        let size = format_file_size(document.size_bytes);
        let date = format_upload_date(&document.uploaded_at);
        let meta = self.i18n.format(
            "documents.meta",
            &[
                ("chunks", chunks.as_str()),
                ("size", size.as_str()),
                ("date", date.as_str()),
            ],
        );
        let target = document.clone();

        div()
            .flex()
            .justify_between()
            .items_center()
            .bg(rgb(0x1e1e1e))
            .rounded_md()
            .px_3()
            .py_2()
            .child(
                div()
                    .flex()
                    .gap_2()
                    .items_center()
                    .child(
                        div()
                            .text_color(icon_color)
                            .child(document.file_type.to_uppercase()),
                    )
                    .child(
                        div()
                            .flex()
                            .flex_col()
                            .child(document.filename.clone())
                            .child(div().text_xs().text_color(rgb(0x9a9a9a)).child(meta)),
                    ),
            )
            .child(button(self.i18n.t("documents.delete")).on_mouse_down(
                MouseButton::Left,
                cx.listener(move |this, _event, window, cx| {
                    this.confirm_delete(&target, window, cx)
                }),
            ))
    }
}

fn nav_item(label: &str, selected: bool) -> gpui::Div {
    div()
        .bg(if selected {
            rgb(0x3355aa)
        } else {
            rgb(0x2d2d2d)
        })
        .text_color(rgb(0xffffff))
        .rounded_md()
        .px_3()
        .py_1()
        .child(label.to_string())
}

fn button(label: &str) -> gpui::Div {
    div()
        .bg(rgb(0x2d2d2d))
        .rounded_md()
        .px_3()
        .py_1()
        .child(label.to_string())
}

fn stat_card(label: &str, value: String) -> impl IntoElement {
    div()
        .flex()
        .flex_col()
        .flex_1()
        .bg(rgb(0x1e2a3a))
        .rounded_md()
        .p_3()
        .child(div().text_sm().text_color(rgb(0x9ab4d8)).child(label.to_string()))
        .child(div().text_lg().child(value))
}

fn main() -> Result<()> {
    let mut data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    data_dir.push("docent");
    if let Err(err) = fs::create_dir_all(&data_dir) {
        eprintln!("failed to prepare data dir: {err}");
    }
    let _log_guard = init_local_logger(&data_dir.join("logs"));

    let config_store = ConfigStore::from_default_location()?;
    let config = match config_store.load_or_init() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to load config: {err:#}");
            ClientConfig::default()
        }
    }
    .with_api_url_override(std::env::var(API_URL_ENV).ok());

    let base_url = config.api_url().context("invalid api base url")?;
    info!(url = %base_url, "starting docent");
    let api: Arc<dyn KnowledgeApi> = Arc::new(HttpGateway::new(base_url));
    let shell = Shell::new(
        api,
        QueryOptions {
            max_chunks: config.max_chunks,
            include_metadata: config.include_metadata,
        },
    );
    let runtime = Arc::new(Runtime::new().context("failed to create tokio runtime")?);
    let i18n = I18n::new(config.language);

    Application::new().run(move |cx: &mut App| {
        let bounds = Bounds::centered(None, size(px(980.0), px(720.0)), cx);
        let title = i18n.t("app.title").to_string();
        let opened = cx.open_window(
            WindowOptions {
                window_bounds: Some(WindowBounds::Windowed(bounds)),
                titlebar: Some(gpui::TitlebarOptions {
                    title: Some(title.into()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            move |_, cx| cx.new(|cx| DocentApp::new(shell, runtime, i18n, cx)),
        );
        if let Err(err) = opened {
            error!("failed to open main window: {err:#}");
            cx.quit();
            return;
        }
        cx.activate(true);
    });
    Ok(())
}

fn init_local_logger(log_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    if let Err(err) = fs::create_dir_all(log_dir) {
        eprintln!("failed to create log dir `{}`: {err}", log_dir.display());
    }
    let file_appender = tracing_appender::rolling::daily(log_dir, "docent.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,app_desktop=debug,core_client=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .with_writer(writer)
        .init();

    guard
}
