/// Texto fijo del comando `help`.
pub const HELP: &str = "\
Comandos disponibles:
sleep <n>               Duerme n segundos.
wait                    Espera a que terminen todas las tareas enviadas.
submit <I> <T> <O> <N>  Envía N tareas que leen I MB de entrada,
                        corren T segundos y producen O MB de salida.
quit, exit              Cierra la cola y sale (con --drain-on-exit
                        espera antes a las tareas pendientes).

";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitArgs {
    pub input_mb: i64,
    pub run_secs: i64,
    pub output_mb: i64,
    pub count: i64,
}

/// Una línea ya interpretada. El orden de `parse` es el orden de prioridad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Sleep(i64),
    Wait,
    Submit(SubmitArgs),
    Quit,
    Help,
    Comment,
    Malformed(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        if line.starts_with('#') {
            return Command::Comment;
        }
        let line = line.trim_end_matches(['\n', '\r']);

        if let Some([secs]) = scan_ints(line, "sleep") {
            return Command::Sleep(secs);
        }
        if line == "wait" {
            return Command::Wait;
        }
        if let Some([input_mb, run_secs, output_mb, count]) = scan_ints(line, "submit") {
            return Command::Submit(SubmitArgs {
                input_mb,
                run_secs,
                output_mb,
                count,
            });
        }
        match line {
            "quit" | "exit" => Command::Quit,
            "help" => Command::Help,
            other => Command::Malformed(other.to_string()),
        }
    }
}

/// Reconoce `<keyword> <int> <int> ...` al estilo scanf: blancos opcionales
/// antes de cada entero y lo que sobra al final se ignora.
fn scan_ints<const N: usize>(line: &str, keyword: &str) -> Option<[i64; N]> {
    let mut rest = line.strip_prefix(keyword)?;
    let mut values = [0i64; N];
    for slot in values.iter_mut() {
        let (n, tail) = take_int(rest.trim_start())?;
        *slot = n;
        rest = tail;
    }
    Some(values)
}

fn take_int(s: &str) -> Option<(i64, &str)> {
    let bytes = s.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    s[..end].parse().ok().map(|n| (n, &s[end..]))
}
