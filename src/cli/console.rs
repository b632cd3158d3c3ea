use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::backends::{
    BackendKind, CerebrasSettings, GroqSettings, OllamaSettings, ResponseFormat, Settings,
    StreamCallback,
};
use crate::constants::DEFAULT_SYSTEM_PROMPT;
use crate::session::ContextManager;

/// Line-based menu over the context manager
pub struct Console<R> {
    manager: Arc<ContextManager>,
    lines: Lines<R>,
}

impl Console<BufReader<Stdin>> {
    pub fn stdin(manager: Arc<ContextManager>) -> Self {
        Self::new(manager, BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> Console<R> {
    pub fn new(manager: Arc<ContextManager>, input: R) -> Self {
        Self {
            manager,
            lines: input.lines(),
        }
    }

    /// Run the menu until the user exits or input ends
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.display_menu();
            let Some(choice) = self.ask("Select an option (1-8): ").await? else {
                break;
            };
            match choice.as_str() {
                "1" => self.create_context().await?,
                "2" => self.list_contexts().await,
                "3" => self.delete_context().await?,
                "4" => self.send_prompt().await?,
                "5" => self.copy_context().await?,
                "6" => self.toggle_autosave(),
                "7" => self.start_game(None).await?,
                "8" => break,
                _ => error("Invalid option. Please select a number between 1 and 8."),
            }
        }
        println!("Exiting Conversation Manager. Goodbye!");
        Ok(())
    }

    fn display_menu(&self) {
        let autosave = if self.manager.autosave_enabled() { "Enabled" } else { "Disabled" };
        println!();
        println!("{}", "=== Conversation Manager ===".bold());
        println!("1. Create Context");
        println!("2. List Contexts");
        println!("3. Delete Context");
        println!("4. Send Prompt");
        println!("5. Copy Context");
        println!("6. Toggle Autosave (Currently: {})", autosave);
        println!("7. Start Game");
        println!("8. Exit");
        println!("=============================");
    }

    /// Print `label` and read one trimmed line; `None` once input is exhausted
    async fn ask(&mut self, label: &str) -> Result<Option<String>> {
        print!("{}", label);
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?.map(|line| line.trim().to_string()))
    }

    async fn ask_yes_no(&mut self, label: &str) -> Result<bool> {
        Ok(self
            .ask(label)
            .await?
            .is_some_and(|answer| answer.eq_ignore_ascii_case("y")))
    }

    /// Ask for a value, keeping `default` on empty input and asking again on garbage
    async fn ask_value<T>(&mut self, name: &str, default: T) -> Result<T>
    where
        T: FromStr + std::fmt::Display + Copy,
    {
        loop {
            let Some(answer) = self.ask(&format!("Enter {} (default: {}): ", name, default)).await? else {
                return Ok(default);
            };
            if answer.is_empty() {
                return Ok(default);
            }
            match answer.parse() {
                Ok(value) => return Ok(value),
                Err(_) => error(&format!("'{}' is not a valid {}.", answer, name)),
            }
        }
    }

    async fn ask_name(&mut self, label: &str) -> Result<Option<String>> {
        match self.ask(label).await? {
            Some(name) if !name.is_empty() => Ok(Some(name)),
            Some(_) => {
                error("Context name cannot be empty.");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn create_context(&mut self) -> Result<()> {
        let Some(name) = self.ask_name("Enter context name: ").await? else {
            return Ok(());
        };

        let backend_input = self
            .ask("Enter backend (Cerebras, Groq, or Ollama): ")
            .await?
            .unwrap_or_default();
        let backend = match backend_input.parse::<BackendKind>() {
            Ok(backend) => backend,
            Err(e) => {
                error(&e.to_string());
                return Ok(());
            }
        };

        let Some(model) = self.select_model(backend).await? else {
            return Ok(());
        };
        let system_prompt = self.system_prompt().await?;
        let settings = self.configure_settings(backend).await?;

        match self
            .manager
            .create_context(&name, backend, &model, &system_prompt, settings)
            .await
        {
            Ok(ack) => {
                println!("{}", ack.message.green());
                show_warning(ack.warning.as_deref());
                if self.ask_yes_no("Do you want to start the game now? (y/n): ").await? {
                    self.start_game(Some(name)).await?;
                }
            }
            Err(e) => error(&e.to_string()),
        }
        Ok(())
    }

    async fn select_model(&mut self, backend: BackendKind) -> Result<Option<String>> {
        let models = self.manager.list_models(backend).await.unwrap_or_default();
        if models.is_empty() {
            error(&format!("No {} models available.", backend.display_name()));
            return Ok(None);
        }

        println!("\nAvailable {} Models:", backend.display_name());
        for (idx, model) in models.iter().enumerate() {
            println!("{}. {}", idx + 1, model);
        }

        loop {
            let Some(choice) = self.ask("Enter the model number: ").await? else {
                return Ok(None);
            };
            match choice.parse::<usize>() {
                Ok(n) if (1..=models.len()).contains(&n) => return Ok(Some(models[n - 1].clone())),
                Ok(_) => println!("Invalid selection. Please try again."),
                Err(_) => println!("Please enter a valid number."),
            }
        }
    }

    /// Blank gives the default prompt; a path to an existing file loads that file
    async fn system_prompt(&mut self) -> Result<String> {
        let answer = self
            .ask("Enter system prompt (leave blank for default or provide a file name): ")
            .await?
            .unwrap_or_default();
        if answer.is_empty() {
            return Ok(DEFAULT_SYSTEM_PROMPT.to_string());
        }
        if Path::new(&answer).is_file() {
            match std::fs::read_to_string(&answer) {
                Ok(contents) => {
                    info("System prompt loaded from file.");
                    return Ok(contents);
                }
                Err(e) => error(&format!("Could not read '{}': {}. Using it as text.", answer, e)),
            }
        }
        Ok(answer)
    }

    async fn configure_settings(&mut self, backend: BackendKind) -> Result<Settings> {
        let stream = self.ask_yes_no("Enable streaming? (y/n): ").await?;
        let settings = match backend {
            BackendKind::Cerebras => {
                let defaults = CerebrasSettings::default();
                let use_tools = self.ask_yes_no("Enable tools? (y/n): ").await?;
                Settings::Cerebras(CerebrasSettings {
                    stream,
                    use_tools,
                    temperature: self.ask_value("temperature", defaults.temperature).await?,
                    max_tokens: self.ask_value("max tokens", defaults.max_tokens).await?,
                    top_p: self.ask_value("top_p", defaults.top_p).await?,
                    ..defaults
                })
            }
            BackendKind::Groq => {
                let defaults = GroqSettings::default();
                let temperature = self.ask_value("temperature", defaults.temperature).await?;
                let max_tokens = self.ask_value("max tokens", defaults.max_tokens).await?;
                let top_p = self.ask_value("top_p", defaults.top_p).await?;
                let json_mode = self.ask_yes_no("Enable JSON mode? (y/n): ").await?;
                Settings::Groq(GroqSettings {
                    stream,
                    temperature,
                    max_tokens,
                    top_p,
                    response_format: json_mode.then_some(ResponseFormat::JsonObject),
                })
            }
            BackendKind::Ollama => {
                let defaults = OllamaSettings::default();
                Settings::Ollama(OllamaSettings {
                    stream,
                    num_predict: self.ask_value("num_predict", defaults.num_predict).await?,
                    temperature: self.ask_value("temperature", defaults.temperature).await?,
                    top_k: self.ask_value("top_k", defaults.top_k).await?,
                    top_p: self.ask_value("top_p", defaults.top_p).await?,
                    repeat_penalty: self.ask_value("repeat_penalty", defaults.repeat_penalty).await?,
                })
            }
        };
        Ok(settings)
    }

    async fn list_contexts(&self) {
        let contexts = self.manager.list_contexts().await;
        if contexts.is_empty() {
            info("No contexts available.");
            return;
        }
        println!("\n--- Available Contexts ---");
        for ctx in contexts {
            println!(
                "Name: {} | Backend: {} | Model: {} | Messages: {}",
                ctx.name.bold(),
                ctx.backend.display_name(),
                ctx.model,
                ctx.message_count
            );
            println!("System Prompt: {}\n", ctx.system_prompt);
        }
        println!("--------------------------");
    }

    async fn delete_context(&mut self) -> Result<()> {
        let Some(name) = self.ask_name("Enter context name to delete: ").await? else {
            return Ok(());
        };
        match self.manager.delete_context(&name).await {
            Ok(ack) => {
                println!("{}", ack.message);
                show_warning(ack.warning.as_deref());
            }
            Err(e) => error(&e.to_string()),
        }
        Ok(())
    }

    async fn send_prompt(&mut self) -> Result<()> {
        let Some(name) = self.ask_name("Enter context name: ").await? else {
            return Ok(());
        };
        let stream = match self.manager.get_context(&name).await {
            Ok(context) => context.settings.stream(),
            Err(e) => {
                error(&e.to_string());
                return Ok(());
            }
        };

        loop {
            let Some(prompt) = self
                .ask("Enter your prompt (or type 'exit' to return to main menu): ")
                .await?
            else {
                return Ok(());
            };
            if prompt.eq_ignore_ascii_case("exit") {
                return Ok(());
            }
            if prompt.is_empty() {
                error("Prompt cannot be empty.");
                continue;
            }

            let callback = stream.then(print_fragment);
            if stream {
                print!("\n{} ", "[Assistant]".cyan());
            }
            match self.manager.send_prompt(&name, &prompt, callback).await {
                Ok(reply) => {
                    if stream {
                        println!("\n");
                    } else {
                        println!("\n{} {}\n", "[Assistant]".cyan(), reply.response);
                    }
                    show_warning(reply.warning.as_deref());
                }
                Err(e) => error(&e.to_string()),
            }
        }
    }

    async fn copy_context(&mut self) -> Result<()> {
        let source = self
            .ask("Enter the name of the context to copy from: ")
            .await?
            .unwrap_or_default();
        let new_name = self.ask("Enter the new context name: ").await?.unwrap_or_default();
        let keep = self
            .ask("Enter the number of recent messages to keep (leave blank to keep all): ")
            .await?
            .unwrap_or_default();
        let keep_last_n = keep.parse::<usize>().ok();

        match self.manager.copy_context(&source, &new_name, keep_last_n).await {
            Ok(ack) => {
                println!("{}", ack.message);
                show_warning(ack.warning.as_deref());
            }
            Err(e) => error(&e.to_string()),
        }
        Ok(())
    }

    fn toggle_autosave(&self) {
        let enabled = self.manager.toggle_autosave();
        println!("Autosave has been {}.", if enabled { "Enabled" } else { "Disabled" });
    }

    async fn start_game(&mut self, name: Option<String>) -> Result<()> {
        let name = match name {
            Some(name) => name,
            None => match self
                .ask_name("Enter the name of the context to use for the game: ")
                .await?
            {
                Some(name) => name,
                None => return Ok(()),
            },
        };
        if let Err(e) = self.manager.get_context(&name).await {
            error(&e.to_string());
            return Ok(());
        }

        println!("\nStarting game with context: {}", name.bold());
        println!("Type 'exit' at any time to end the game.");
        show_game_turn(self.manager.start_game(&name, None).await);

        loop {
            let Some(action) = self.ask("\nYour action: ").await? else {
                return Ok(());
            };
            if action.eq_ignore_ascii_case("exit") {
                println!("Ending game. Returning to main menu.");
                return Ok(());
            }
            show_game_turn(self.manager.game_turn(&name, &action, None).await);
        }
    }
}

fn print_fragment() -> StreamCallback {
    Arc::new(|fragment: &str| {
        print!("{}", fragment);
        let _ = std::io::stdout().flush();
    })
}

fn show_game_turn(result: Result<crate::game::GameTurn, crate::utils::ManagerError>) {
    match result {
        Ok(turn) => {
            println!("{}", turn.formatted);
            show_warning(turn.warning.as_deref());
        }
        Err(e) => println!("{}", e),
    }
}

fn show_warning(warning: Option<&str>) {
    if let Some(warning) = warning {
        println!("{} {}", "[Warning]".yellow(), warning);
    }
}

fn info(message: &str) {
    println!("{} {}", "[Info]".blue(), message);
}

fn error(message: &str) {
    println!("{} {}", "[Error]".red(), message);
}
