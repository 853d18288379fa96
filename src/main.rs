use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use tally::config;
use tally::core::section::Section;
use tally::core::task::Task;
use tally::store::{Store, StoreError};

#[derive(Parser)]
#[command(name = "tally", version, about = "A sectioned todo tracker backed by a JSON file")]
struct Cli {
    /// Path to the data file.
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    /// Log at debug level instead of warnings only.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task.
    Add {
        title: String,

        /// Section to file the task under.
        #[arg(long, short, default_value = "General")]
        section: String,

        #[arg(long, short, default_value = "")]
        description: String,
    },

    /// Add a subtask under an existing task.
    Subtask {
        parent_id: String,
        title: String,

        #[arg(long, short, default_value = "")]
        description: String,
    },

    /// List tasks, grouped by section.
    List {
        /// Only this section.
        #[arg(long, short)]
        section: Option<String>,

        /// Only completed tasks.
        #[arg(long)]
        completed: bool,
    },

    /// Show one task in detail, subtask tree included.
    Show { task_id: String },

    /// Mark a task as completed.
    Done { task_id: String },

    /// Mark a task as not completed.
    Undone { task_id: String },

    /// Remove a task.
    Rm { task_id: String },

    /// List sections with task counts.
    Sections,

    /// Manage sections.
    Section {
        #[command(subcommand)]
        action: SectionAction,
    },
}

#[derive(Subcommand)]
enum SectionAction {
    /// Create a section.
    Add { name: String },
    /// Remove a section and all tasks it owns.
    Rm { name: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    // The handle keeps the logger alive until the process exits.
    let _logger = match flexi_logger::Logger::try_with_env_or_str(level).and_then(|l| l.start()) {
        Ok(handle) => Some(handle),
        Err(err) => {
            eprintln!("failed to initialize logging: {err}");
            None
        }
    };

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, StoreError> {
    let path = cli.file.unwrap_or_else(config::default_data_file);
    let mut store = Store::open(path)?;

    match cli.command {
        Commands::Add {
            title,
            section,
            description,
        } => {
            let task = store.create_task(&title, &section, &description)?;
            println!("added {} to `{section}`: {}", task.id, task.title);
        }

        Commands::Subtask {
            parent_id,
            title,
            description,
        } => {
            let task = Task::with_description(title, description)?;
            let id = task.id.clone();
            if !store.add_subtask(&parent_id, task)? {
                eprintln!("task {parent_id} not found");
                return Ok(ExitCode::FAILURE);
            }
            println!("added subtask {id} under {parent_id}");
        }

        Commands::List { section, completed } => {
            if let Some(name) = section {
                let Some(section) = store.get_section_by_name(&name) else {
                    eprintln!("section `{name}` not found");
                    return Ok(ExitCode::FAILURE);
                };
                print_section(section, completed);
            } else {
                for section in store.sections() {
                    print_section(section, completed);
                }
            }
        }

        Commands::Show { task_id } => {
            let Some(task) = store.get_task(&task_id) else {
                eprintln!("task {task_id} not found");
                return Ok(ExitCode::FAILURE);
            };
            print_task_detail(task);
        }

        Commands::Done { task_id } => {
            if !store.set_task_completed(&task_id, true)? {
                eprintln!("task {task_id} not found");
                return Ok(ExitCode::FAILURE);
            }
            println!("completed {task_id}");
        }

        Commands::Undone { task_id } => {
            if !store.set_task_completed(&task_id, false)? {
                eprintln!("task {task_id} not found");
                return Ok(ExitCode::FAILURE);
            }
            println!("reopened {task_id}");
        }

        Commands::Rm { task_id } => {
            if !store.remove_task_by_id(&task_id)? {
                eprintln!("task {task_id} not found");
                return Ok(ExitCode::FAILURE);
            }
            println!("removed {task_id}");
        }

        Commands::Sections => {
            for section in store.sections() {
                println!("{} ({} tasks)", section.name, section.tasks.len());
            }
        }

        Commands::Section { action } => match action {
            SectionAction::Add { name } => {
                let section = store.create_section(&name)?;
                println!("section `{}` ready", section.name);
            }
            SectionAction::Rm { name } => {
                if !store.remove_section_by_name(&name)? {
                    eprintln!("section `{name}` not found");
                    return Ok(ExitCode::FAILURE);
                }
                println!("removed section `{name}`");
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}

fn print_section(section: &Section, completed_only: bool) {
    let tasks = if completed_only {
        section.completed_tasks()
    } else {
        section.tasks.iter().collect()
    };
    if completed_only && tasks.is_empty() {
        return;
    }
    println!("{}:", section.name);
    for task in tasks {
        print_task_line(task);
    }
}

fn print_task_line(task: &Task) {
    let marker = if task.completed { "x" } else { " " };
    if task.subtasks.is_empty() {
        println!("  [{marker}] {}  {}", task.id, task.title);
    } else {
        println!(
            "  [{marker}] {}  {} ({}%)",
            task.id,
            task.title,
            task.progress()
        );
    }
}

fn print_task_detail(task: &Task) {
    let status = if task.is_fully_complete() {
        "completed"
    } else if task.completed {
        "completed (subtasks pending)"
    } else {
        "pending"
    };
    println!("{}  {} ({status}, {}%)", task.id, task.title, task.progress());
    if !task.description.is_empty() {
        println!("  {}", task.description);
    }
    println!(
        "  created {}  updated {}",
        task.created_at.format("%Y-%m-%d %H:%M"),
        task.updated_at.format("%Y-%m-%d %H:%M")
    );
    for subtask in &task.subtasks {
        print_subtask(subtask, 1);
    }
}

fn print_subtask(task: &Task, depth: usize) {
    let marker = if task.completed { "x" } else { " " };
    println!("{}[{marker}] {}  {}", "  ".repeat(depth), task.id, task.title);
    for subtask in &task.subtasks {
        print_subtask(subtask, depth + 1);
    }
}
