use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::time::Duration;

/// Токен отмены для фоновых протоколов повтора.
///
/// Отмена наблюдается на границах задержек и попыток: уже начатый
/// платформенный вызов всегда доводится до конца, жёсткого прерывания
/// задач нет. На каждую активацию создаётся новый токен - замена токена
/// и есть "отмена предыдущего повтора".
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Отменяемое ожидание: true - задержка прошла полностью,
    /// false - сработала отмена
    pub async fn sleep(&self, duration: Duration) -> bool {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Регистрируем ожидающего до проверки флага, иначе отмена между
        // проверкой и select теряет пробуждение
        notified.as_mut().enable();

        if self.is_cancelled() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = &mut notified => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_without_cancel() {
        let token = CancelToken::new();
        assert!(token.sleep(Duration::from_millis(500)).await);
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wakes_sleeper() {
        let token = Arc::new(CancelToken::new());

        let waiter = {
            let token = Arc::clone(&token);
            tokio::spawn(async move { token.sleep(Duration::from_secs(3600)).await })
        };

        tokio::task::yield_now().await;
        token.cancel();

        assert!(!waiter.await.unwrap());
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_skips_sleep() {
        let token = CancelToken::new();
        token.cancel();
        assert!(!token.sleep(Duration::from_secs(10)).await);
    }
}
