use std::fs;

/// Получить имя процесса по pid через /proc/<pid>/comm.
/// Возвращает None, если процесс уже завершился или чтение не удалось -
/// для фильтра окон это эквивалентно несовпадению.
pub fn process_name(pid: u32) -> Option<String> {
    let path = format!("/proc/{}/comm", pid);
    match fs::read_to_string(&path) {
        Ok(comm) => {
            let name = comm.trim().to_string();
            if name.is_empty() {
                None
            } else {
                Some(name)
            }
        }
        Err(_) => None,
    }
}
